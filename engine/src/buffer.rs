use crate::error::RenderError;
use std::marker::PhantomData;
use std::ops::Deref;
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, Buffer, BufferAddress,
    BufferDescriptor, BufferUsages, Device, IndexFormat, Queue, VertexBufferLayout,
};

pub trait GpuVertexBufferLayout {
    fn layout() -> VertexBufferLayout<'static>;
}

pub struct GpuBuffer {
    inner: Buffer,
    size: BufferAddress,
}

pub struct GpuVertexBuffer<T: GpuVertexBufferLayout> {
    inner: GpuBuffer,
    _vertex_type: PhantomData<T>,
}

pub struct GpuIndexBuffer<T: ToIndexFormat> {
    inner: GpuBuffer,
    _index_type: PhantomData<T>,
}

pub struct GpuUniformBuffer<T: Uniform + bytemuck::Pod + bytemuck::Zeroable> {
    inner: GpuBuffer,
    _uniform_type: PhantomData<T>,
}

impl GpuBuffer {
    pub fn new_with_data<T>(
        device: &Device,
        data: &[T],
        usage: BufferUsages,
        label: Option<&str>,
    ) -> Self
    where
        T: bytemuck::Pod + bytemuck::Zeroable,
    {
        let contents = bytemuck::cast_slice(data);
        let size = contents.len() as BufferAddress;
        let buffer = device.create_buffer_init(&BufferInitDescriptor {
            label,
            contents,
            usage,
        });

        Self {
            inner: buffer,
            size,
        }
    }

    /// Allocates a fixed-size buffer that is filled through [`Self::write_region`].
    pub fn new_with_capacity(
        device: &Device,
        size: BufferAddress,
        usage: BufferUsages,
        label: Option<&str>,
    ) -> Self {
        let buffer = device.create_buffer(&BufferDescriptor {
            label,
            size,
            usage: usage | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            inner: buffer,
            size,
        }
    }

    pub fn update<T>(&self, queue: &Queue, data: &[T])
    where
        T: bytemuck::Pod + bytemuck::Zeroable,
    {
        queue.write_buffer(&self.inner, 0, bytemuck::cast_slice(data));
    }

    /// Writes `data` at the given byte offset, rejecting writes that would
    /// run past the fixed allocation. The buffer is never grown.
    pub fn write_region<T>(
        &self,
        queue: &Queue,
        offset: BufferAddress,
        data: &[T],
    ) -> Result<(), RenderError>
    where
        T: bytemuck::Pod + bytemuck::Zeroable,
    {
        let bytes = bytemuck::cast_slice(data);
        let len = bytes.len() as BufferAddress;
        if offset + len > self.size {
            return Err(RenderError::BufferUpload {
                offset,
                len,
                capacity: self.size,
            });
        }

        queue.write_buffer(&self.inner, offset, bytes);
        Ok(())
    }

    /// Size of the allocation in bytes.
    pub fn size(&self) -> BufferAddress {
        self.size
    }
}

impl Deref for GpuBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> GpuVertexBuffer<T>
where
    T: GpuVertexBufferLayout + bytemuck::Pod + bytemuck::Zeroable,
{
    pub fn with_capacity(device: &Device, count: usize, label: Option<&str>) -> Self {
        let size = (count * std::mem::size_of::<T>()) as BufferAddress;
        let buffer = GpuBuffer::new_with_capacity(device, size, BufferUsages::VERTEX, label);

        Self {
            inner: buffer,
            _vertex_type: PhantomData,
        }
    }

    /// Writes `data` starting at the given vertex slot.
    pub fn write_at(&self, queue: &Queue, offset: usize, data: &[T]) -> Result<(), RenderError> {
        let byte_offset = (offset * std::mem::size_of::<T>()) as BufferAddress;
        self.inner.write_region(queue, byte_offset, data)
    }
}

impl<T> Deref for GpuVertexBuffer<T>
where
    T: GpuVertexBufferLayout + bytemuck::Pod + bytemuck::Zeroable,
{
    type Target = GpuBuffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub trait ToIndexFormat {
    const INDEX_FORMAT: IndexFormat;
}

impl ToIndexFormat for u16 {
    const INDEX_FORMAT: IndexFormat = IndexFormat::Uint16;
}

impl ToIndexFormat for u32 {
    const INDEX_FORMAT: IndexFormat = IndexFormat::Uint32;
}

impl<T> GpuIndexBuffer<T>
where
    T: ToIndexFormat + bytemuck::Pod + bytemuck::Zeroable,
{
    pub fn with_capacity(device: &Device, count: usize, label: Option<&str>) -> Self {
        let size = (count * std::mem::size_of::<T>()) as BufferAddress;
        let buffer = GpuBuffer::new_with_capacity(device, size, BufferUsages::INDEX, label);

        Self {
            inner: buffer,
            _index_type: PhantomData,
        }
    }

    /// Writes `data` starting at the given index slot.
    pub fn write_at(&self, queue: &Queue, offset: usize, data: &[T]) -> Result<(), RenderError> {
        let byte_offset = (offset * std::mem::size_of::<T>()) as BufferAddress;
        self.inner.write_region(queue, byte_offset, data)
    }

    pub fn index_format(&self) -> IndexFormat {
        T::INDEX_FORMAT
    }
}

impl<T> Deref for GpuIndexBuffer<T>
where
    T: ToIndexFormat + bytemuck::Pod + bytemuck::Zeroable,
{
    type Target = GpuBuffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub trait Uniform {
    fn bind_group_layout_entry() -> BindGroupLayoutEntry;
}

impl<T> GpuUniformBuffer<T>
where
    T: Uniform + bytemuck::Pod + bytemuck::Zeroable,
{
    pub fn new(device: &Device, data: &[T], label: Option<&str>) -> Self {
        let buffer = GpuBuffer::new_with_data(
            device,
            data,
            BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            label,
        );

        Self {
            inner: buffer,
            _uniform_type: PhantomData,
        }
    }

    pub fn update(&self, queue: &Queue, data: &[T]) {
        self.inner.update(queue, data);
    }

    pub fn bind_group_layout(device: &Device, label: Option<&str>) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            entries: &[T::bind_group_layout_entry()],
            label,
        })
    }
}

impl<T> Deref for GpuUniformBuffer<T>
where
    T: Uniform + bytemuck::Pod + bytemuck::Zeroable,
{
    type Target = GpuBuffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

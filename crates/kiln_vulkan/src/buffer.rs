use ash::vk;
use std::rc::Rc;

use crate::{
    commands::{CommandBufferError, CommandPool},
    device::LogicalDevice,
    mesh::MeshError,
    VulkanError,
};

#[derive(thiserror::Error, Debug)]
pub enum BufferError {
    #[error("Can't create a buffer that holds no elements")]
    Empty,
    #[error("Failed to create a Vulkan buffer: {0}")]
    CantCreate(VulkanError),
    #[error("No memory type with {0:?} can back the buffer")]
    NoSuitableMemory(vk::MemoryPropertyFlags),
    #[error("Failed to allocate buffer memory: {0}")]
    CantAllocate(VulkanError),
    #[error("Failed to map buffer memory: {0}")]
    CantMap(VulkanError),
    #[error("Can't write {given} elements into a buffer of {capacity}")]
    TooLarge { given: usize, capacity: usize },
    #[error("Can't copy between buffers: {0}")]
    InvalidCopy(&'static str),
    #[error("Failed to transfer buffer data: {0}")]
    Transfer(#[from] CommandBufferError),
    #[error(transparent)]
    InvalidMesh(#[from] MeshError),
}

/// Picks the first memory type allowed by `type_bits` that has every flag in `required`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (memory_properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);

    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|&(index, memory_type)| {
            type_bits & (1u32 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
}

/// Typed GPU buffer holding `len` elements of `T`, with its own memory allocation
pub struct Buffer<T: Copy> {
    mapped: Option<*mut T>,
    usage: vk::BufferUsageFlags,
    len: usize,
    size: vk::DeviceSize,

    handle: vk::Buffer,
    memory: vk::DeviceMemory,
    device: Rc<LogicalDevice>,
}

impl<T: Copy> Buffer<T> {
    pub fn new(
        device: Rc<LogicalDevice>,
        len: usize,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
    ) -> Result<Buffer<T>, BufferError> {
        if len == 0 || std::mem::size_of::<T>() == 0 {
            return Err(BufferError::Empty);
        }
        let size = (std::mem::size_of::<T>() * len) as vk::DeviceSize;

        let create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let handle = unsafe {
            device
                .vk_handle()
                .create_buffer(&create_info, None)
                .map_err(|err| BufferError::CantCreate(err.into()))?
        };

        let memory = match Buffer::<T>::allocate(&device, handle, memory_properties) {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.vk_handle().destroy_buffer(handle, None) };
                return Err(err);
            }
        };

        Ok(Buffer {
            mapped: None,
            usage,
            len,
            size,

            handle,
            memory,
            device,
        })
    }

    fn allocate(
        device: &LogicalDevice,
        handle: vk::Buffer,
        memory_properties: vk::MemoryPropertyFlags,
    ) -> Result<vk::DeviceMemory, BufferError> {
        let requirements = unsafe { device.vk_handle().get_buffer_memory_requirements(handle) };
        let memory_type = device
            .find_memory_type(requirements.memory_type_bits, memory_properties)
            .ok_or(BufferError::NoSuitableMemory(memory_properties))?;

        let allocate_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        unsafe {
            let memory = device
                .vk_handle()
                .allocate_memory(&allocate_info, None)
                .map_err(|err| BufferError::CantAllocate(err.into()))?;

            if let Err(err) = device.vk_handle().bind_buffer_memory(handle, memory, 0) {
                device.vk_handle().free_memory(memory, None);
                return Err(BufferError::CantAllocate(err.into()));
            }

            Ok(memory)
        }
    }

    /// Creates a device local buffer filled with `data` through a host visible staging buffer.
    ///
    /// Blocks until the copy has finished, the staging buffer is gone when this returns.
    pub fn with_data(
        device: Rc<LogicalDevice>,
        transfer_pool: &mut CommandPool,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Buffer<T>, BufferError> {
        let mut staging = Buffer::new(
            device.clone(),
            data.len(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write(data)?;

        let mut buffer = Buffer::new(
            device,
            data.len(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        buffer.copy_from(&staging, transfer_pool)?;
        log::trace!(
            "Uploaded {} bytes into a device local {:?} buffer",
            buffer.size,
            usage
        );

        Ok(buffer)
    }
}

impl<T: Copy> Buffer<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn descriptor(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.handle,
            offset: 0,
            range: self.size,
        }
    }

    pub(crate) fn vk_handle(&self) -> vk::Buffer {
        self.handle
    }
}

impl<T: Copy> Buffer<T> {
    /// Maps the whole buffer, the mapping stays until [`Buffer::unmap`] or drop.
    ///
    /// The memory has to be host visible.
    pub fn map(&mut self) -> Result<(), BufferError> {
        if self.mapped.is_some() {
            return Ok(());
        }

        let pointer = unsafe {
            self.device
                .vk_handle()
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(|err| BufferError::CantMap(err.into()))?
        };
        self.mapped = Some(pointer as *mut T);

        Ok(())
    }

    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe {
                self.device.vk_handle().unmap_memory(self.memory);
            };
        }
    }

    /// Copies `data` to the start of the buffer.
    ///
    /// A buffer that wasn't mapped is mapped for the write only. Writes are visible to the
    /// device without a flush, so the memory has to be host coherent.
    pub fn write(&mut self, data: &[T]) -> Result<(), BufferError> {
        if data.len() > self.len {
            return Err(BufferError::TooLarge {
                given: data.len(),
                capacity: self.len,
            });
        }

        let was_mapped = self.is_mapped();
        self.map()?;
        if let Some(mapped) = self.mapped {
            unsafe {
                mapped.copy_from_nonoverlapping(data.as_ptr(), data.len());
            };
        }
        if !was_mapped {
            self.unmap();
        }

        Ok(())
    }

    /// Copies all of `source` into this buffer on the queue of `transfer_pool`
    pub fn copy_from(
        &mut self,
        source: &Buffer<T>,
        transfer_pool: &mut CommandPool,
    ) -> Result<(), BufferError> {
        if !self.usage.contains(vk::BufferUsageFlags::TRANSFER_DST) {
            return Err(BufferError::InvalidCopy(
                "Buffer being copied to is missing TRANSFER_DST usage",
            ));
        }
        if !source.usage.contains(vk::BufferUsageFlags::TRANSFER_SRC) {
            return Err(BufferError::InvalidCopy(
                "Buffer being copied from is missing TRANSFER_SRC usage",
            ));
        }
        if source.size > self.size {
            return Err(BufferError::InvalidCopy(
                "Buffer being copied from is larger than the destination",
            ));
        }

        let size = source.size;
        let (src, dst) = (source.handle, self.handle);
        transfer_pool.run_once(|command_buffer| command_buffer.copy_buffer(src, dst, size))?;

        Ok(())
    }
}

impl<T: Copy> Drop for Buffer<T> {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.device.vk_handle().destroy_buffer(self.handle, None);
            self.device.vk_handle().free_memory(self.memory, None);
        };
    }
}

use ash::vk;
use std::{
    fs::File,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{device::LogicalDevice, VulkanError};

/// First word of every SPIR-V module
const SPIRV_MAGIC_NUMBER: u32 = 0x0723_0203;

/// Possible errors that could be returned while loading a shader
#[derive(thiserror::Error, Debug)]
pub enum ShaderError {
    #[error("The shader file {} could not be opened", path.display())]
    FileNotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read the contents of {}", path.display())]
    CantRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a SPIR-V binary", path.display())]
    InvalidSpirv { path: PathBuf },
    #[error("Failed to create a Vulkan shader module: {0}")]
    BuildFail(VulkanError),
}

/// Reads a precompiled SPIR-V binary into the words Vulkan consumes
pub fn load_spirv(path: &Path) -> Result<Vec<u32>, ShaderError> {
    let mut file = File::open(path).map_err(|source| ShaderError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|source| ShaderError::CantRead {
        path: path.to_path_buf(),
        source,
    })?;

    if !has_spirv_magic(&bytes) {
        return Err(ShaderError::InvalidSpirv {
            path: path.to_path_buf(),
        });
    }

    // Swaps big endian modules into host order and rejects partial words
    ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(|source| ShaderError::CantRead {
        path: path.to_path_buf(),
        source,
    })
}

fn has_spirv_magic(bytes: &[u8]) -> bool {
    match bytes.get(..4) {
        Some(&[a, b, c, d]) => {
            let word = u32::from_le_bytes([a, b, c, d]);
            word == SPIRV_MAGIC_NUMBER || word == SPIRV_MAGIC_NUMBER.swap_bytes()
        }
        _ => false,
    }
}

pub struct ShaderModule {
    handle: vk::ShaderModule,
    device: Rc<LogicalDevice>,
}

impl ShaderModule {
    pub fn from_file(device: Rc<LogicalDevice>, path: impl AsRef<Path>) -> Result<ShaderModule, ShaderError> {
        let path = path.as_ref();
        let code = load_spirv(path)?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let handle = unsafe {
            device
                .vk_handle()
                .create_shader_module(&create_info, None)
                .map_err(|err| ShaderError::BuildFail(err.into()))?
        };
        log::debug!("Loaded shader {}", path.display());

        Ok(ShaderModule { handle, device })
    }
}

impl ShaderModule {
    pub(crate) fn vk_handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device
                .vk_handle()
                .destroy_shader_module(self.handle, None);
        };
    }
}

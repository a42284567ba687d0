//! SPIR-V shader module loading.

use std::fs::File;
use std::path::Path;

use ash::util::read_spv;
use ash::vk;

use crate::error::{GpuError, Result};

/// Read a SPIR-V binary from disk.
pub fn load_shader_code(path: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(path).map_err(|source| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })?;
    read_spv(&mut file).map_err(|source| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Create a shader module from SPIR-V words.
pub fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    let module = unsafe { device.create_shader_module(&create_info, None)? };
    Ok(module)
}

/// Load a SPIR-V binary from disk and wrap it in a shader module.
pub fn load_shader_module(device: &ash::Device, path: &Path) -> Result<vk::ShaderModule> {
    let code = load_shader_code(path)?;
    create_shader_module(device, &code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_shader_path_is_reported() {
        let path = Path::new("/nonexistent/thalassa/shader.spv");
        match load_shader_code(path) {
            Err(GpuError::ShaderLoad { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected a shader load error, got {other:?}"),
        }
    }

    #[test]
    fn reads_spv_words_from_disk() {
        let path = std::env::temp_dir().join(format!("thalassa-shader-{}.spv", std::process::id()));
        std::fs::write(&path, 0x0723_0203_u32.to_le_bytes()).unwrap();

        let code = load_shader_code(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(code.unwrap(), [0x0723_0203]);
    }
}

/// Vulkan backend configuration

/// Options for [`crate::create_vulkan_device`]
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Request `VK_LAYER_KHRONOS_validation` and a debug messenger
    ///
    /// Only honored when the crate is built with the `vulkan-validation`
    /// feature. Defaults to on in debug builds.
    pub enable_validation: bool,

    /// Application name reported to the driver
    pub app_name: String,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Lumen Application".to_string(),
        }
    }
}

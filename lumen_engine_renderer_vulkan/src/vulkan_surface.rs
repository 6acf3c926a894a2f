/// VulkanSurface - Vulkan implementation of the PresentSurface trait
///
/// Owns the window surface and its swapchain. Swapchain images are only ever
/// blit targets, so no image views are created for them.

use ash::vk::{self, Handle};
use lumen_engine::lumen::device::{
    AcquiredImage, Extent2D, Format, GraphicsDevice, ImageHandle, PresentSurface, SemaphoreHandle,
};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_debug, engine_error, engine_info};
use std::sync::Arc;

use crate::vulkan_conversions::{format_from_vk, vk_error};
use crate::vulkan_device::VulkanDevice;

const SOURCE: &str = "lumen::vulkan::VulkanSurface";

/// Swapchain images requested beyond the surface minimum
const EXTRA_IMAGES: u32 = 1;

pub struct VulkanSurface {
    /// Keeps the device (and instance) alive until the surface is gone
    device: Arc<VulkanDevice>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl VulkanSurface {
    /// Take over `surface` and build a swapchain of `width` x `height`
    pub(crate) fn new(device: Arc<VulkanDevice>, surface: vk::SurfaceKHR, width: u32, height: u32) -> Result<Self> {
        let surface_loader = device.surface_loader();
        let swapchain_loader = device.swapchain_loader();

        let surface_format = match Self::choose_format(&device, &surface_loader, surface) {
            Ok(format) => format,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let mut this = Self {
            device,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            surface_format,
            extent: vk::Extent2D { width, height },
        };
        // On failure Drop releases the surface
        this.build_swapchain(width, height)?;
        Ok(this)
    }

    /// Prefer 8-bit BGRA UNORM with sRGB non-linear color space
    fn choose_format(
        device: &VulkanDevice,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceFormatKHR> {
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device(), surface)
        }
        .map_err(|e| vk_error("vkGetPhysicalDeviceSurfaceFormatsKHR", e))?;

        formats
            .iter()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| formats.first())
            .copied()
            .ok_or_else(|| {
                engine_error!(SOURCE, "Surface reports no formats");
                Error::InitializationFailed("Surface reports no formats".to_string())
            })
    }

    /// Create a swapchain replacing the current one, if any
    fn build_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.device.physical_device(), self.surface)
        }
        .map_err(|e| vk_error("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", e))?;

        // u32::MAX means the surface follows the swapchain size
        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
            }
        };

        let mut image_count = capabilities.min_image_count + EXTRA_IMAGES;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|e| vk_error("vkCreateSwapchainKHR", e))?;

        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;

        self.images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| vk_error("vkGetSwapchainImagesKHR", e))?;
        self.extent = extent;

        engine_debug!(SOURCE, "Swapchain {}x{} with {} images ({:?})",
            extent.width, extent.height, self.images.len(), self.surface_format.format);
        Ok(())
    }
}

impl PresentSurface for VulkanSurface {
    fn acquire_next_image(&mut self, signal: SemaphoreHandle, timeout_ns: u64) -> Result<AcquiredImage> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                vk::Semaphore::from_raw(signal.as_raw()),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquiredImage { index, suboptimal }),
            Err(e) => Err(vk_error("vkAcquireNextImageKHR", e)),
        }
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [vk::Semaphore::from_raw(wait.as_raw())];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        self.device
            .queue_present(&self.swapchain_loader, &present_info)
            .map_err(|e| vk_error("vkQueuePresentKHR", e))
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.build_swapchain(width, height)?;
        engine_info!(SOURCE, "Swapchain recreated at {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    fn image(&self, index: u32) -> Option<ImageHandle> {
        self.images
            .get(index as usize)
            .map(|image| ImageHandle::from_raw(image.as_raw()))
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn extent(&self) -> Extent2D {
        Extent2D::new(self.extent.width, self.extent.height)
    }

    fn format(&self) -> Format {
        format_from_vk(self.surface_format.format)
    }
}

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        self.device.wait_idle().ok();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

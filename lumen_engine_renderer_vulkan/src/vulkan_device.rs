/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Engine handles carry the raw Vulkan handle, so most calls convert and
/// forward. Buffers and images additionally own a gpu-allocator allocation,
/// tracked in handle tables keyed by the raw handle.

use ash::vk::{self, Handle};
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use lumen_engine::lumen::device::*;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use rustc_hash::FxHashMap;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard, PoisonError};
use winit::window::Window;

use crate::vulkan_config::VulkanConfig;
use crate::vulkan_conversions::*;

const SOURCE: &str = "lumen::vulkan";

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

const SHADER_ENTRY: &CStr = c"main";

type DebugMessenger = (ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT);

/// Lock ignoring poisoning: the tables hold plain data that stays consistent
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Engine handle to Vulkan handle
fn vk_handle<T: Handle>(raw: u64) -> T {
    T::from_raw(raw)
}

fn subresource_range(aspect: vk::ImageAspectFlags, base_mip: u32, levels: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: base_mip,
        level_count: levels,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn corner(extent: Extent2D) -> vk::Offset3D {
    vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: 1,
    }
}

fn init_failed(context: &str, detail: impl std::fmt::Debug) -> Error {
    engine_error!(SOURCE, "{}: {:?}", context, detail);
    Error::InitializationFailed(format!("{}: {:?}", context, detail))
}

/// Buffer memory plus the size the buffer was created with
struct BufferRecord {
    allocation: Allocation,
    size: u64,
}

/// Pieces created after the instance and surface, released together on failure
struct LogicalDevice {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue_family: u32,
    queue: vk::Queue,
    allocator: Allocator,
    device_name: String,
}

/// Vulkan 1.3 device
///
/// Uses one queue family for graphics and presentation, dynamic rendering,
/// synchronization2 and buffer device addresses.
pub struct VulkanDevice {
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,

    graphics_queue: vk::Queue,
    graphics_queue_family: u32,
    /// Serializes queue submission, presentation and wait-idle
    queue_lock: Mutex<()>,

    /// Dropped manually before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    buffers: Mutex<FxHashMap<u64, BufferRecord>>,
    images: Mutex<FxHashMap<u64, Allocation>>,

    debug_messenger: Option<DebugMessenger>,
    device_name: String,
}

impl VulkanDevice {
    /// Create the instance, the window surface and the logical device
    ///
    /// The surface is returned unowned; [`crate::VulkanSurface`] takes it over.
    pub(crate) fn new(window: &Window, config: &VulkanConfig) -> Result<(Self, vk::SurfaceKHR)> {
        let display_handle = window
            .display_handle()
            .map_err(|e| init_failed("Failed to get display handle", e))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| init_failed("Failed to get window handle", e))?
            .as_raw();

        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_failed("Failed to load Vulkan library", e))?;

            let validation = Self::validation_available(&entry, config);
            let instance = Self::create_instance(&entry, display_handle, &config.app_name, validation)?;
            let debug_messenger = if validation {
                Self::create_debug_messenger(&entry, &instance)
            } else {
                None
            };

            let surface = match ash_window::create_surface(&entry, &instance, display_handle, window_handle, None) {
                Ok(surface) => surface,
                Err(e) => {
                    Self::destroy_instance(&instance, debug_messenger.as_ref());
                    return Err(init_failed("Failed to create window surface", e));
                }
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let logical = match Self::create_logical_device(&instance, &surface_loader, surface) {
                Ok(logical) => logical,
                Err(e) => {
                    surface_loader.destroy_surface(surface, None);
                    Self::destroy_instance(&instance, debug_messenger.as_ref());
                    return Err(e);
                }
            };

            engine_info!(SOURCE, "Vulkan device ready: {} (validation {})",
                logical.device_name, if validation { "on" } else { "off" });

            let device = Self {
                entry,
                instance,
                physical_device: logical.physical_device,
                device: logical.device,
                graphics_queue: logical.queue,
                graphics_queue_family: logical.queue_family,
                queue_lock: Mutex::new(()),
                allocator: ManuallyDrop::new(Mutex::new(logical.allocator)),
                buffers: Mutex::new(FxHashMap::default()),
                images: Mutex::new(FxHashMap::default()),
                debug_messenger,
                device_name: logical.device_name,
            };
            Ok((device, surface))
        }
    }

    /// Whether validation can be turned on for this build and loader
    fn validation_available(entry: &ash::Entry, config: &VulkanConfig) -> bool {
        if !config.enable_validation {
            return false;
        }
        if !cfg!(feature = "vulkan-validation") {
            engine_warn!(SOURCE, "Validation requested but the vulkan-validation feature is disabled");
            return false;
        }

        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let found = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
        if !found {
            engine_warn!(SOURCE, "{:?} not installed, continuing without validation", VALIDATION_LAYER);
        }
        found
    }

    unsafe fn create_instance(
        entry: &ash::Entry,
        display_handle: RawDisplayHandle,
        app_name: &str,
        validation: bool,
    ) -> Result<ash::Instance> {
        let app_name = CString::new(app_name).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"Lumen")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extension_names = ash_window::enumerate_required_extensions(display_handle)
            .map_err(|e| init_failed("Failed to get required extensions", e))?
            .to_vec();
        if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_names = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        entry
            .create_instance(&create_info, None)
            .map_err(|e| init_failed("Failed to create Vulkan instance", e))
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Option<DebugMessenger> {
        crate::vulkan_debug::reset_validation_stats();
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
        match debug_utils.create_debug_utils_messenger(&crate::vulkan_debug::messenger_create_info(), None) {
            Ok(messenger) => Some((debug_utils, messenger)),
            Err(e) => {
                engine_warn!(SOURCE, "Failed to create debug messenger: {:?}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(_entry: &ash::Entry, _instance: &ash::Instance) -> Option<DebugMessenger> {
        None
    }

    unsafe fn destroy_instance(instance: &ash::Instance, debug_messenger: Option<&DebugMessenger>) {
        if let Some((debug_utils, messenger)) = debug_messenger {
            debug_utils.destroy_debug_utils_messenger(*messenger, None);
        }
        instance.destroy_instance(None);
    }

    /// Pick the best Vulkan 1.3 GPU that can draw to `surface`
    ///
    /// Discrete GPUs win over integrated ones, integrated over anything else.
    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32, String)> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_failed("Failed to enumerate physical devices", e))?;

        let mut best: Option<(u32, vk::PhysicalDevice, u32, String)> = None;
        for physical_device in physical_devices {
            let properties = instance.get_physical_device_properties(physical_device);
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            if properties.api_version < vk::API_VERSION_1_3 {
                engine_debug!(SOURCE, "Skipping {}: Vulkan 1.3 not supported", name);
                continue;
            }

            let queue_family = instance
                .get_physical_device_queue_family_properties(physical_device)
                .iter()
                .enumerate()
                .find(|(index, family)| {
                    family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                        && surface_loader
                            .get_physical_device_surface_support(physical_device, *index as u32, surface)
                            .unwrap_or(false)
                })
                .map(|(index, _)| index as u32);
            let Some(queue_family) = queue_family else {
                engine_debug!(SOURCE, "Skipping {}: no graphics queue that can present", name);
                continue;
            };

            let score = match properties.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 2,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                _ => 0,
            };
            if best.as_ref().map_or(true, |(best_score, ..)| score > *best_score) {
                best = Some((score, physical_device, queue_family, name));
            }
        }

        best.map(|(_, physical_device, queue_family, name)| (physical_device, queue_family, name))
            .ok_or_else(|| init_failed("No suitable GPU", "Vulkan 1.3 with a presenting graphics queue required"))
    }

    unsafe fn create_logical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<LogicalDevice> {
        let (physical_device, queue_family, device_name) =
            Self::pick_physical_device(instance, surface_loader, surface)?;

        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)];

        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

        let mut features_13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let mut features_12 = vk::PhysicalDeviceVulkan12Features::default()
            .buffer_device_address(true)
            .descriptor_indexing(true);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .push_next(&mut features_12)
            .push_next(&mut features_13);

        let device = instance
            .create_device(physical_device, &device_create_info, None)
            .map_err(|e| init_failed("Failed to create logical device", e))?;

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                device.destroy_device(None);
                return Err(init_failed("Failed to create GPU allocator", e));
            }
        };

        let queue = device.get_device_queue(queue_family, 0);

        Ok(LogicalDevice {
            physical_device,
            device,
            queue_family,
            queue,
            allocator,
            device_name,
        })
    }

    // ===== ACCESSORS =====

    /// Name reported by the driver for the selected GPU
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Number of live buffers and images owned by the allocator tables
    pub fn live_allocations(&self) -> (usize, usize) {
        (lock(&self.buffers).len(), lock(&self.images).len())
    }

    pub(crate) fn surface_loader(&self) -> ash::khr::surface::Instance {
        ash::khr::surface::Instance::new(&self.entry, &self.instance)
    }

    pub(crate) fn swapchain_loader(&self) -> ash::khr::swapchain::Device {
        ash::khr::swapchain::Device::new(&self.instance, &self.device)
    }

    pub(crate) fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Present on the graphics queue, serialized with submissions
    pub(crate) fn queue_present(
        &self,
        loader: &ash::khr::swapchain::Device,
        info: &vk::PresentInfoKHR<'_>,
    ) -> ash::prelude::VkResult<bool> {
        let _queue = lock(&self.queue_lock);
        unsafe { loader.queue_present(self.graphics_queue, info) }
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        lock(&*self.allocator)
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: memory_location_to_allocator(location),
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| allocation_error(name, e))
    }

    fn free(&self, allocation: Allocation) {
        if let Err(e) = lock(&*self.allocator).free(allocation) {
            engine_warn!(SOURCE, "Failed to free allocation: {}", e);
        }
    }

    fn cmd_image_barrier(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
        range: vk::ImageSubresourceRange,
    ) {
        let barrier = vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
            .old_layout(from)
            .new_layout(to)
            .image(image)
            .subresource_range(range);
        let dependency = vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&barrier));
        unsafe { self.device.cmd_pipeline_barrier2(cmd, &dependency) };
    }

    fn cmd_blit(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        dst: vk::Image,
        src_extent: Extent2D,
        dst_extent: Extent2D,
        src_mip: u32,
        dst_mip: u32,
    ) {
        let region = vk::ImageBlit2::default()
            .src_subresource(color_layers(src_mip))
            .src_offsets([vk::Offset3D::default(), corner(src_extent)])
            .dst_subresource(color_layers(dst_mip))
            .dst_offsets([vk::Offset3D::default(), corner(dst_extent)]);
        let blit = vk::BlitImageInfo2::default()
            .src_image(src)
            .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_image(dst)
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .filter(vk::Filter::LINEAR)
            .regions(std::slice::from_ref(&region));
        unsafe { self.device.cmd_blit_image2(cmd, &blit) };
    }
}

impl GraphicsDevice for VulkanDevice {
    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None) }
            .map_err(|e| vk_error("vkCreateFence", e))?;
        Ok(FenceHandle::from_raw(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device.destroy_fence(vk_handle(fence.as_raw()), None) };
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout_ns: u64) -> Result<()> {
        unsafe { self.device.wait_for_fences(&[vk_handle(fence.as_raw())], true, timeout_ns) }
            .map_err(|e| vk_error("vkWaitForFences", e))
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe { self.device.reset_fences(&[vk_handle(fence.as_raw())]) }
            .map_err(|e| vk_error("vkResetFences", e))
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| vk_error("vkCreateSemaphore", e))?;
        Ok(SemaphoreHandle::from_raw(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device.destroy_semaphore(vk_handle(semaphore.as_raw()), None) };
    }

    fn wait_idle(&self) -> Result<()> {
        let _queue = lock(&self.queue_lock);
        unsafe { self.device.device_wait_idle() }.map_err(|e| vk_error("vkDeviceWaitIdle", e))
    }

    // ===== COMMAND BUFFERS =====

    fn create_command_pool(&self) -> Result<CommandPoolHandle> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.graphics_queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { self.device.create_command_pool(&create_info, None) }
            .map_err(|e| vk_error("vkCreateCommandPool", e))?;
        Ok(CommandPoolHandle::from_raw(pool.as_raw()))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe { self.device.destroy_command_pool(vk_handle(pool.as_raw()), None) };
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk_handle(pool.as_raw()))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| vk_error("vkAllocateCommandBuffers", e))?;
        buffers
            .first()
            .map(|cmd| CommandBufferHandle::from_raw(cmd.as_raw()))
            .ok_or_else(|| engine_err!(SOURCE, "vkAllocateCommandBuffers returned no command buffer"))
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(vk_handle(cmd.as_raw()), vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| vk_error("vkResetCommandBuffer", e))
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(vk_handle(cmd.as_raw()), &begin_info) }
            .map_err(|e| vk_error("vkBeginCommandBuffer", e))
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe { self.device.end_command_buffer(vk_handle(cmd.as_raw())) }
            .map_err(|e| vk_error("vkEndCommandBuffer", e))
    }

    fn submit(
        &self,
        cmd: CommandBufferHandle,
        wait: Option<SemaphoreHandle>,
        signal: Option<SemaphoreHandle>,
        fence: FenceHandle,
    ) -> Result<()> {
        let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(vk_handle(cmd.as_raw()))];
        let wait_infos: Vec<vk::SemaphoreSubmitInfo> = wait
            .into_iter()
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(vk_handle(semaphore.as_raw()))
                    .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                    .value(1)
            })
            .collect();
        let signal_infos: Vec<vk::SemaphoreSubmitInfo> = signal
            .into_iter()
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(vk_handle(semaphore.as_raw()))
                    .stage_mask(vk::PipelineStageFlags2::ALL_GRAPHICS)
                    .value(1)
            })
            .collect();

        let submit_info = vk::SubmitInfo2::default()
            .command_buffer_infos(&command_buffers)
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos);

        let _queue = lock(&self.queue_lock);
        unsafe {
            self.device
                .queue_submit2(self.graphics_queue, &[submit_info], vk_handle(fence.as_raw()))
        }
        .map_err(|e| vk_error("vkQueueSubmit2", e))
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .filter(|size| size.count > 0)
            .map(|size| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(size.descriptor_type),
                descriptor_count: size.count,
            })
            .collect();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { self.device.create_descriptor_pool(&create_info, None) }
            .map_err(|e| vk_error("vkCreateDescriptorPool", e))?;
        Ok(DescriptorPoolHandle::from_raw(pool.as_raw()))
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(vk_handle(pool.as_raw()), vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(|e| vk_error("vkResetDescriptorPool", e))
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe { self.device.destroy_descriptor_pool(vk_handle(pool.as_raw()), None) };
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let layouts = [vk_handle::<vk::DescriptorSetLayout>(layout.as_raw())];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk_handle(pool.as_raw()))
            .set_layouts(&layouts);
        // Pool exhaustion maps to OutOfPoolMemory/FragmentedPool without logging
        let sets = unsafe { self.device.allocate_descriptor_sets(&allocate_info) }
            .map_err(|e| vk_error("vkAllocateDescriptorSets", e))?;
        sets.first()
            .map(|set| DescriptorSetHandle::from_raw(set.as_raw()))
            .ok_or_else(|| engine_err!(SOURCE, "vkAllocateDescriptorSets returned no set"))
    }

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                    .descriptor_count(binding.count)
                    .stage_flags(shader_stages_to_vk(binding.stages))
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| vk_error("vkCreateDescriptorSetLayout", e))?;
        Ok(DescriptorSetLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe { self.device.destroy_descriptor_set_layout(vk_handle(layout.as_raw()), None) };
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) {
        let mut image_infos = Vec::new();
        let mut buffer_infos = Vec::new();
        for write in writes {
            match *write {
                DescriptorWrite::Image { view, sampler, layout, .. } => image_infos.push(
                    vk::DescriptorImageInfo::default()
                        .image_view(vk_handle(view.as_raw()))
                        .sampler(vk_handle(sampler.as_raw()))
                        .image_layout(image_layout_to_vk(layout)),
                ),
                DescriptorWrite::Buffer { buffer, offset, size, .. } => buffer_infos.push(
                    vk::DescriptorBufferInfo::default()
                        .buffer(vk_handle(buffer.as_raw()))
                        .offset(offset)
                        .range(size),
                ),
            }
        }

        let dst_set = vk_handle::<vk::DescriptorSet>(set.as_raw());
        let (mut next_image, mut next_buffer) = (0, 0);
        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .map(|write| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(dst_set)
                    .dst_binding(write.binding());
                match *write {
                    DescriptorWrite::Image { descriptor_type, .. } => {
                        let info = &image_infos[next_image..next_image + 1];
                        next_image += 1;
                        base.descriptor_type(descriptor_type_to_vk(descriptor_type)).image_info(info)
                    }
                    DescriptorWrite::Buffer { descriptor_type, .. } => {
                        let info = &buffer_infos[next_buffer..next_buffer + 1];
                        next_buffer += 1;
                        base.descriptor_type(descriptor_type_to_vk(descriptor_type)).buffer_info(info)
                    }
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) };
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, size: u64, usage: BufferUsage, location: MemoryLocation) -> Result<AllocatedBuffer> {
        if size == 0 {
            return Err(Error::InvalidResource("Buffer size must be non-zero".to_string()));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(buffer_usage_to_vk(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        unsafe {
            let buffer = self
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| vk_error("vkCreateBuffer", e))?;
            let requirements = self.device.get_buffer_memory_requirements(buffer);

            let allocation = match self.allocate("buffer", requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = self
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                self.free(allocation);
                self.device.destroy_buffer(buffer, None);
                return Err(vk_error("vkBindBufferMemory", e));
            }

            lock(&self.buffers).insert(buffer.as_raw(), BufferRecord { allocation, size });

            Ok(AllocatedBuffer {
                buffer: BufferHandle::from_raw(buffer.as_raw()),
                size,
                usage,
                location,
            })
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let record = lock(&self.buffers).remove(&buffer.as_raw());
        unsafe { self.device.destroy_buffer(vk_handle(buffer.as_raw()), None) };
        match record {
            Some(record) => self.free(record.allocation),
            None => engine_warn!(SOURCE, "destroy_buffer: {} has no allocation", buffer),
        }
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut buffers = lock(&self.buffers);
        let record = buffers
            .get_mut(&buffer.as_raw())
            .ok_or_else(|| Error::InvalidResource(format!("write_buffer: unknown {}", buffer)))?;
        let size = record.size as usize;
        let mapped = record
            .allocation
            .mapped_slice_mut()
            .ok_or_else(|| engine_err!(SOURCE, "write_buffer: {} is not host visible", buffer))?;

        let start = offset as usize;
        let end = start
            .checked_add(data.len())
            .filter(|end| *end <= size.min(mapped.len()))
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "write_buffer: {} bytes at offset {} overflow {}",
                    data.len(),
                    offset,
                    buffer
                ))
            })?;
        mapped[start..end].copy_from_slice(data);
        Ok(())
    }

    fn buffer_device_address(&self, buffer: BufferHandle) -> u64 {
        let info = vk::BufferDeviceAddressInfo::default().buffer(vk_handle(buffer.as_raw()));
        unsafe { self.device.get_buffer_device_address(&info) }
    }

    // ===== IMAGES =====

    fn create_image(&self, desc: &ImageDesc) -> Result<AllocatedImage> {
        if desc.extent.texel_count() == 0 || desc.format == Format::Undefined {
            return Err(Error::InvalidResource(format!("Invalid image description: {:?}", desc)));
        }

        let format = format_to_vk(desc.format);
        let mip_levels = desc.mip_levels.max(1);
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: desc.extent.depth,
            })
            .mip_levels(mip_levels)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = self
                .device
                .create_image(&create_info, None)
                .map_err(|e| vk_error("vkCreateImage", e))?;
            let requirements = self.device.get_image_memory_requirements(image);

            let allocation = match self.allocate("image", requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = self
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                self.free(allocation);
                self.device.destroy_image(image, None);
                return Err(vk_error("vkBindImageMemory", e));
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(subresource_range(aspect_for_format(desc.format), 0, mip_levels));
            let view = match self.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    self.free(allocation);
                    self.device.destroy_image(image, None);
                    return Err(vk_error("vkCreateImageView", e));
                }
            };

            lock(&self.images).insert(image.as_raw(), allocation);

            Ok(AllocatedImage {
                image: ImageHandle::from_raw(image.as_raw()),
                view: ImageViewHandle::from_raw(view.as_raw()),
                extent: desc.extent,
                format: desc.format,
                mip_levels,
            })
        }
    }

    fn destroy_image(&self, image: &AllocatedImage) {
        let allocation = lock(&self.images).remove(&image.image.as_raw());
        unsafe {
            self.device.destroy_image_view(vk_handle(image.view.as_raw()), None);
            self.device.destroy_image(vk_handle(image.image.as_raw()), None);
        }
        match allocation {
            Some(allocation) => self.free(allocation),
            None => engine_warn!(SOURCE, "destroy_image: {} has no allocation", image.image),
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);
        let sampler = unsafe { self.device.create_sampler(&create_info, None) }
            .map_err(|e| vk_error("vkCreateSampler", e))?;
        Ok(SamplerHandle::from_raw(sampler.as_raw()))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        unsafe { self.device.destroy_sampler(vk_handle(sampler.as_raw()), None) };
    }

    // ===== SHADERS AND PIPELINES =====

    fn create_shader_module(&self, spirv: &[u32]) -> Result<ShaderModuleHandle> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(spirv);
        let module = unsafe { self.device.create_shader_module(&create_info, None) }
            .map_err(|e| vk_error("vkCreateShaderModule", e))?;
        Ok(ShaderModuleHandle::from_raw(module.as_raw()))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe { self.device.destroy_shader_module(vk_handle(module.as_raw()), None) };
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> =
            desc.set_layouts.iter().map(|layout| vk_handle(layout.as_raw())).collect();
        let push_constants: Vec<vk::PushConstantRange> = desc
            .push_constants
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: shader_stages_to_vk(range.stages),
                offset: range.offset,
                size: range.size,
            })
            .collect();
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constants);
        let layout = unsafe { self.device.create_pipeline_layout(&create_info, None) }
            .map_err(|e| vk_error("vkCreatePipelineLayout", e))?;
        Ok(PipelineLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        unsafe { self.device.destroy_pipeline_layout(vk_handle(layout.as_raw()), None) };
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle> {
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vk_handle(desc.vertex_shader.as_raw()))
                .name(SHADER_ENTRY),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(vk_handle(desc.fragment_shader.as_raw()))
                .name(SHADER_ENTRY),
        ];

        // Vertices are pulled through the buffer device address
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(polygon_mode_to_vk(desc.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(front_face_to_vk(desc.front_face));
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);

        let blend_attachments = [blend_attachment(desc.blend)];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&blend_attachments);

        let depth_test = desc.depth_test && desc.depth_format.is_some();
        let depth_stencil = depth_stencil_state(depth_test, desc.depth_write);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [format_to_vk(desc.color_format)];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(desc.depth_format.map_or(vk::Format::UNDEFINED, format_to_vk));

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic_state)
            .layout(vk_handle(desc.layout.as_raw()))
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        match pipelines {
            Ok(pipelines) => pipelines
                .first()
                .map(|pipeline| PipelineHandle::from_raw(pipeline.as_raw()))
                .ok_or_else(|| engine_err!(SOURCE, "vkCreateGraphicsPipelines returned no pipeline")),
            Err((partial, e)) => {
                for pipeline in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    unsafe { self.device.destroy_pipeline(pipeline, None) };
                }
                Err(vk_error("vkCreateGraphicsPipelines", e))
            }
        }
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<PipelineHandle> {
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(vk_handle(desc.shader.as_raw()))
            .name(SHADER_ENTRY);
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage)
            .layout(vk_handle(desc.layout.as_raw()));

        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        match pipelines {
            Ok(pipelines) => pipelines
                .first()
                .map(|pipeline| PipelineHandle::from_raw(pipeline.as_raw()))
                .ok_or_else(|| engine_err!(SOURCE, "vkCreateComputePipelines returned no pipeline")),
            Err((partial, e)) => {
                for pipeline in partial.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    unsafe { self.device.destroy_pipeline(pipeline, None) };
                }
                Err(vk_error("vkCreateComputePipelines", e))
            }
        }
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        unsafe { self.device.destroy_pipeline(vk_handle(pipeline.as_raw()), None) };
    }

    // ===== RECORDING =====

    fn cmd_transition_image(&self, cmd: CommandBufferHandle, image: ImageHandle, from: ImageLayout, to: ImageLayout) {
        let aspect = if to == ImageLayout::DepthAttachmentOptimal || from == ImageLayout::DepthAttachmentOptimal {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };
        self.cmd_image_barrier(
            vk_handle(cmd.as_raw()),
            vk_handle(image.as_raw()),
            image_layout_to_vk(from),
            image_layout_to_vk(to),
            subresource_range(aspect, 0, vk::REMAINING_MIP_LEVELS),
        );
    }

    fn cmd_copy_buffer(
        &self,
        cmd: CommandBufferHandle,
        src: BufferHandle,
        dst: BufferHandle,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) {
        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        unsafe {
            self.device.cmd_copy_buffer(
                vk_handle(cmd.as_raw()),
                vk_handle(src.as_raw()),
                vk_handle(dst.as_raw()),
                &[region],
            )
        };
    }

    fn cmd_copy_buffer_to_image(&self, cmd: CommandBufferHandle, src: BufferHandle, dst: ImageHandle, extent: Extent3D) {
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(color_layers(0))
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: extent.depth,
            });
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                vk_handle(cmd.as_raw()),
                vk_handle(src.as_raw()),
                vk_handle(dst.as_raw()),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        };
    }

    fn cmd_blit_image(
        &self,
        cmd: CommandBufferHandle,
        src: ImageHandle,
        dst: ImageHandle,
        src_extent: Extent2D,
        dst_extent: Extent2D,
    ) {
        self.cmd_blit(
            vk_handle(cmd.as_raw()),
            vk_handle(src.as_raw()),
            vk_handle(dst.as_raw()),
            src_extent,
            dst_extent,
            0,
            0,
        );
    }

    fn cmd_generate_mipmaps(&self, cmd: CommandBufferHandle, image: ImageHandle, extent: Extent2D, mip_levels: u32) {
        let cmd = vk_handle::<vk::CommandBuffer>(cmd.as_raw());
        let image = vk_handle::<vk::Image>(image.as_raw());
        let mut size = extent;

        for mip in 0..mip_levels {
            let half = Extent2D::new((size.width / 2).max(1), (size.height / 2).max(1));

            self.cmd_image_barrier(
                cmd,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                subresource_range(vk::ImageAspectFlags::COLOR, mip, 1),
            );

            if mip + 1 < mip_levels {
                self.cmd_blit(cmd, image, image, size, half, mip, mip + 1);
            }
            size = half;
        }

        self.cmd_image_barrier(
            cmd,
            image,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            subresource_range(vk::ImageAspectFlags::COLOR, 0, mip_levels),
        );
    }

    fn cmd_clear_color_image(&self, cmd: CommandBufferHandle, image: ImageHandle, color: [f32; 4]) {
        let clear = vk::ClearColorValue { float32: color };
        unsafe {
            self.device.cmd_clear_color_image(
                vk_handle(cmd.as_raw()),
                vk_handle(image.as_raw()),
                vk::ImageLayout::GENERAL,
                &clear,
                &[subresource_range(vk::ImageAspectFlags::COLOR, 0, vk::REMAINING_MIP_LEVELS)],
            )
        };
    }

    fn cmd_begin_rendering(&self, cmd: CommandBufferHandle, info: &RenderingInfo) {
        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(vk_handle(info.color_view.as_raw()))
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(if info.color_clear.is_some() {
                vk::AttachmentLoadOp::CLEAR
            } else {
                vk::AttachmentLoadOp::LOAD
            })
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: info.color_clear.unwrap_or_default(),
                },
            })];

        let depth_attachment = info.depth_view.map(|view| {
            vk::RenderingAttachmentInfo::default()
                .image_view(vk_handle(view.as_raw()))
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .load_op(if info.depth_clear.is_some() {
                    vk::AttachmentLoadOp::CLEAR
                } else {
                    vk::AttachmentLoadOp::LOAD
                })
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: info.depth_clear.unwrap_or(0.0),
                        stencil: 0,
                    },
                })
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: vk::Extent2D {
                    width: info.extent.width,
                    height: info.extent.height,
                },
            })
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth);
        }

        unsafe { self.device.cmd_begin_rendering(vk_handle(cmd.as_raw()), &rendering_info) };
    }

    fn cmd_end_rendering(&self, cmd: CommandBufferHandle) {
        unsafe { self.device.cmd_end_rendering(vk_handle(cmd.as_raw())) };
    }

    fn cmd_set_viewport_scissor(&self, cmd: CommandBufferHandle, extent: Extent2D) {
        let cmd = vk_handle::<vk::CommandBuffer>(cmd.as_raw());
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: vk::Extent2D {
                width: extent.width,
                height: extent.height,
            },
        };
        unsafe {
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle) {
        unsafe {
            self.device.cmd_bind_pipeline(
                vk_handle(cmd.as_raw()),
                bind_point_to_vk(bind_point),
                vk_handle(pipeline.as_raw()),
            )
        };
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        set_index: u32,
        set: DescriptorSetHandle,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                vk_handle(cmd.as_raw()),
                bind_point_to_vk(bind_point),
                vk_handle(layout.as_raw()),
                set_index,
                &[vk_handle(set.as_raw())],
                &[],
            )
        };
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                vk_handle(cmd.as_raw()),
                vk_handle(buffer.as_raw()),
                0,
                vk::IndexType::UINT32,
            )
        };
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStages,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(
                vk_handle(cmd.as_raw()),
                vk_handle(layout.as_raw()),
                shader_stages_to_vk(stages),
                offset,
                data,
            )
        };
    }

    fn cmd_draw_indexed(&self, cmd: CommandBufferHandle, index_count: u32, first_index: u32) {
        unsafe {
            self.device
                .cmd_draw_indexed(vk_handle(cmd.as_raw()), index_count, 1, first_index, 0, 0)
        };
    }

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(vk_handle(cmd.as_raw()), x, y, z) };
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Anything still in the tables was leaked by the caller
            let buffers = std::mem::take(self.buffers.get_mut().unwrap_or_else(PoisonError::into_inner));
            let images = std::mem::take(self.images.get_mut().unwrap_or_else(PoisonError::into_inner));
            if !buffers.is_empty() || !images.is_empty() {
                engine_warn!(SOURCE, "Device dropped with {} buffers and {} images alive",
                    buffers.len(), images.len());
            }
            for (raw, record) in buffers {
                self.device.destroy_buffer(vk_handle(raw), None);
                self.free(record.allocation);
            }
            for (raw, allocation) in images {
                self.device.destroy_image(vk_handle(raw), None);
                self.free(allocation);
            }

            // Allocator memory blocks must go before the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            Self::destroy_instance(&self.instance, self.debug_messenger.as_ref());
        }
    }
}

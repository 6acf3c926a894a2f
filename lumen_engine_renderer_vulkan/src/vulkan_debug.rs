/// Validation layer messenger
///
/// Compiled only with the `vulkan-validation` feature. Messages are routed
/// through the engine logger under `lumen::vulkan::validation` and counted
/// per severity.

use ash::vk;
use colored::*;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};

const SOURCE: &str = "lumen::vulkan::validation";

static ERRORS: AtomicU32 = AtomicU32::new(0);
static WARNINGS: AtomicU32 = AtomicU32::new(0);
static INFO: AtomicU32 = AtomicU32::new(0);

/// Validation message counts since the device was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info
    }
}

pub(crate) fn reset_validation_stats() {
    ERRORS.store(0, Ordering::Relaxed);
    WARNINGS.store(0, Ordering::Relaxed);
    INFO.store(0, Ordering::Relaxed);
}

pub fn validation_stats() -> ValidationStats {
    ValidationStats {
        errors: ERRORS.load(Ordering::Relaxed),
        warnings: WARNINGS.load(Ordering::Relaxed),
        info: INFO.load(Ordering::Relaxed),
    }
}

/// Print the validation counters to stderr
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        eprintln!("{}", "No validation messages".green().bold());
        return;
    }

    eprintln!("{}", "=== Validation Report ===".bright_blue().bold());
    if stats.errors > 0 {
        eprintln!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        eprintln!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        eprintln!("  {} {}", "Info:".cyan(), stats.info);
    }
}

pub(crate) fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;

    let message_id = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    let kind = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        ERRORS.fetch_add(1, Ordering::Relaxed);
        lumen_engine::engine_error!(SOURCE, "[{}] {}: {}", kind, message_id, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        WARNINGS.fetch_add(1, Ordering::Relaxed);
        lumen_engine::engine_warn!(SOURCE, "[{}] {}: {}", kind, message_id, message);
    } else {
        INFO.fetch_add(1, Ordering::Relaxed);
        lumen_engine::engine_debug!(SOURCE, "[{}] {}: {}", kind, message_id, message);
    }

    vk::FALSE
}

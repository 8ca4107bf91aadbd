use ash::{extensions::ext::DebugUtils, vk};
use std::{
    ffi::{c_void, CStr},
    rc::Rc,
};

use crate::{instance::Instance, VulkanError};

/// Errors that can be thrown by the debugger
#[derive(thiserror::Error, Debug)]
pub enum DebuggerError {
    #[error("Failed to create the Vulkan debug messenger: {0}")]
    CantCreate(VulkanError),
}

/// Wraps the Vulkan debug utils messenger
pub struct Debugger {
    /// Vulkan debug utils extension used to create the messenger
    debug_utils: DebugUtils,
    /// Opaque handle to Vulkan debug utils messenger
    handle: vk::DebugUtilsMessengerEXT,
    /// Instance the messenger was created on, kept alive until the messenger is destroyed
    _instance: Rc<Instance>,
}

impl Debugger {
    /// Creates a debug messenger that forwards validation and performance messages to `log`
    pub fn new(instance: Rc<Instance>) -> Result<Debugger, DebuggerError> {
        let debug_utils = DebugUtils::new(instance.entry(), instance.vk_handle());
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            )
            .pfn_user_callback(Some(vulkan_debug_utils_callback));

        let handle = unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(|err| DebuggerError::CantCreate(err.into()))?
        };
        log::debug!("Vulkan debug messenger attached");

        Ok(Debugger {
            debug_utils,
            handle,
            _instance: instance,
        })
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        unsafe {
            self.debug_utils
                .destroy_debug_utils_messenger(self.handle, None);
        };
    }
}

/// Log level a Vulkan message of the given severity is forwarded at
fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Debug
    } else {
        log::Level::Trace
    }
}

/// Vulkan callback to print vulkan debug messages using the `log` crate
unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let type_ = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "[General]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[Performance]",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[Validation]",
        _ => "[Unknown]",
    };
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    log::log!(
        severity_level(message_severity),
        "[Vulkan] {} {}",
        type_,
        message.to_string_lossy()
    );

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_map_onto_log_levels() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert_eq!(severity_level(Severity::VERBOSE), log::Level::Trace);
        assert_eq!(severity_level(Severity::INFO), log::Level::Debug);
        assert_eq!(severity_level(Severity::WARNING), log::Level::Warn);
        assert_eq!(severity_level(Severity::ERROR), log::Level::Error);
    }
}

use std::{
    ffi::{CStr, CString},
    os::raw::c_char,
};

/// Converts a nul terminated char array returned by Vulkan into a String
pub fn char_array_to_string(raw_string_array: &[c_char]) -> String {
    let raw_string = unsafe { CStr::from_ptr(raw_string_array.as_ptr()) };

    raw_string.to_string_lossy().into_owned()
}

/// Converts a pointer to a nul terminated string into a String
pub fn char_ptr_to_string(string_ptr: *const c_char) -> String {
    let raw_string = unsafe { CStr::from_ptr(string_ptr) };

    raw_string.to_string_lossy().into_owned()
}

/// Converts names into the nul terminated strings Vulkan expects.
///
/// Names containing an interior nul byte are skipped, they can't name a layer or extension.
pub fn to_cstrings(names: &[&str]) -> Vec<CString> {
    names
        .iter()
        .filter_map(|&name| CString::new(name).ok())
        .collect()
}

/// Returns every entry of `required` that is missing from `supported`
pub fn missing_required(supported: &[String], required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|&name| !supported.contains(name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn reports_only_missing_names() {
        let supported = strings(&["VK_KHR_surface", "VK_KHR_xlib_surface"]);
        let required = strings(&["VK_KHR_surface", "VK_EXT_debug_utils"]);

        assert_eq!(
            missing_required(&supported, &required),
            strings(&["VK_EXT_debug_utils"])
        );
        assert!(missing_required(&supported, &strings(&["VK_KHR_surface"])).is_empty());
    }

    #[test]
    fn reads_nul_terminated_arrays() {
        let mut raw = [0 as c_char; 16];
        for (slot, byte) in raw.iter_mut().zip(b"VK_KHR_swapchain".iter().take(15)) {
            *slot = *byte as c_char;
        }

        assert_eq!(char_array_to_string(&raw), "VK_KHR_swapchai");
    }

    #[test]
    fn skips_names_with_interior_nul() {
        let names = to_cstrings(&["VK_LAYER_KHRONOS_validation", "bad\0name"]);

        assert_eq!(names.len(), 1);
        assert_eq!(names[0].to_str(), Ok("VK_LAYER_KHRONOS_validation"));
    }
}

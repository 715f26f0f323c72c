use std::{
    ffi::{CStr, CString},
    sync::Arc,
};

use ash::vk;
use raw_window_handle::HasDisplayHandle;

use crate::error::InstanceError;

use super::PhysicalDeviceFilter;

const UNKNOWNID: &CStr = c"unknown id";
const NOMSG: &CStr = c"no message";
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

///Routes validation layer messages into the log crate, or stdout if logging is disabled.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    #[allow(unused)] message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut core::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        #[cfg(feature = "logging")]
        log::error!("VkFrameDebugMsg: Got Msg, but no data!");
        return vk::FALSE;
    }

    let data = unsafe { &*p_callback_data };
    let id = data.message_id_number;
    let idname = if data.p_message_id_name.is_null() {
        UNKNOWNID
    } else {
        unsafe { CStr::from_ptr(data.p_message_id_name) }
    };
    let msg = if data.p_message.is_null() {
        NOMSG
    } else {
        unsafe { CStr::from_ptr(data.p_message) }
    };

    #[cfg(feature = "logging")]
    {
        if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            log::error!("[{}: {:?}]: {:?}", id, idname, msg);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            log::warn!("[{}: {:?}]: {:?}", id, idname, msg);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            log::info!("[{}: {:?}]: {:?}", id, idname, msg);
        } else {
            log::trace!("[{}: {:?}]: {:?}", id, idname, msg);
        }
    }

    #[cfg(not(feature = "logging"))]
    println!(
        "VkFrameDebugMsg: Level: {:?}, Type: {:?}\nId[{}: {:?}]: {:?}",
        message_severity, message_types, id, idname, msg
    );

    vk::FALSE
}

///Instance configuration as well as the source entry point. Usually this struct is created via [Instance::load].
pub struct InstanceBuilder {
    pub entry: ash::Entry,
    pub application_name: CString,
    pub validation: bool,
    pub enabled_layers: Vec<CString>,
    pub enabled_extensions: Vec<CString>,
    available_layers: Vec<vk::LayerProperties>,
    available_extensions: Vec<vk::ExtensionProperties>,
}

impl InstanceBuilder {
    ///Builds the instance from the current information. If validation is enabled, also creates a debug
    /// messenger that reports through [vulkan_debug_callback].
    pub fn build(mut self) -> Result<Arc<Instance>, InstanceError> {
        if self.validation {
            self = self.with_layer(VALIDATION_LAYER.to_owned())?;
            self = self.with_extension(ash::ext::debug_utils::NAME.to_owned())?;
        }

        let InstanceBuilder {
            entry,
            application_name,
            validation,
            enabled_layers,
            enabled_extensions,
            available_layers: _,
            available_extensions: _,
        } = self;

        let app_desc = vk::ApplicationInfo::default()
            .application_name(&application_name)
            .engine_name(c"vkframe")
            .api_version(vk::make_api_version(
                0,
                Instance::API_VERSION_MAJOR,
                Instance::API_VERSION_MINOR,
                Instance::API_VERSION_PATCH,
            ));

        #[cfg(feature = "logging")]
        {
            log::info!("Instance creation:");
            log::info!(
                "  Vulkan version: {}.{}.{}",
                Instance::API_VERSION_MAJOR,
                Instance::API_VERSION_MINOR,
                Instance::API_VERSION_PATCH,
            );
            log::info!("  Layers:");
            for l in &enabled_layers {
                log::info!("    {:?}", l);
            }
            log::info!("  Extensions:");
            for e in &enabled_extensions {
                log::info!("    {:?}", e);
            }
        }

        let extension_ptrs = enabled_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<_>>();
        let layer_ptrs = enabled_layers
            .iter()
            .map(|l| l.as_ptr())
            .collect::<Vec<_>>();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_desc)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug_messenger = if validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
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
                .pfn_user_callback(Some(vulkan_debug_callback));
            match unsafe { loader.create_debug_utils_messenger(&info, None) } {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(Arc::new(Instance {
            entry,
            inner: instance,
            debug_messenger,
        }))
    }

    fn name_matches(raw: &[std::ffi::c_char], name: &CStr) -> bool {
        match CStr::from_bytes_until_nul(bytemuck::cast_slice(raw)) {
            Ok(raw_name) => raw_name == name,
            Err(_) => {
                #[cfg(feature = "logging")]
                log::error!(
                    "Could not parse name: {}",
                    String::from_utf8_lossy(bytemuck::cast_slice(raw))
                );
                false
            }
        }
    }

    pub fn is_layer_available(&self, name: &CStr) -> bool {
        self.available_layers
            .iter()
            .any(|l| Self::name_matches(&l.layer_name, name))
    }

    ///Returns true if a instance-extension with the given name was found
    pub fn is_extension_available(&self, name: &CStr) -> bool {
        self.available_extensions
            .iter()
            .any(|e| Self::name_matches(&e.extension_name, name))
    }

    ///adds an extensions with the given name, if it was not added yet.
    pub fn with_extension(mut self, name: CString) -> Result<Self, InstanceError> {
        if !self.is_extension_available(&name) {
            return Err(InstanceError::MissingExtension(name));
        }

        if self.enabled_extensions.contains(&name) {
            #[cfg(feature = "logging")]
            log::warn!("Tried to enable extension twice: {:?}", name);
            return Ok(self);
        }

        #[cfg(feature = "logging")]
        log::info!("Enabling instance-extension: {:?}", name);
        self.enabled_extensions.push(name);
        Ok(self)
    }

    ///adds an layer with the given name to the list of layers
    pub fn with_layer(mut self, name: CString) -> Result<Self, InstanceError> {
        if !self.is_layer_available(&name) {
            return Err(InstanceError::MissingLayer(name));
        }

        if !self.enabled_layers.contains(&name) {
            self.enabled_layers.push(name);
        }
        Ok(self)
    }

    pub fn with_application_name(mut self, name: CString) -> Self {
        self.application_name = name;
        self
    }

    ///Enables all extensions that are needed for the surface behind `handle` to work.
    pub fn for_surface(mut self, handle: &dyn HasDisplayHandle) -> Result<Self, InstanceError> {
        let required_extensions =
            ash_window::enumerate_required_extensions(handle.display_handle()?.as_raw())?;
        for r in required_extensions {
            let st = unsafe { CStr::from_ptr(*r).to_owned() };
            self = self.with_extension(st)?;
        }

        Ok(self)
    }

    ///Enables the Khronos validation layer and a debug messenger that reports via the log crate if the `logging` feature is enabled.
    pub fn enable_validation(mut self) -> Self {
        self.validation = true;
        self
    }
}

///Wraps the entry point as well as the created instance into one object.
///
/// # Safety
///
/// This struct is un-clonable for a reason. It implements [Drop] which takes care of destroying the vulkan instance, as well as the debug
/// messenger if it was loaded.
pub struct Instance {
    pub entry: ash::Entry,
    pub inner: ash::Instance,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    ///The major version of Vulkan loaded.
    pub const API_VERSION_MAJOR: u32 = 1;
    ///The minor version of Vulkan loaded.
    pub const API_VERSION_MINOR: u32 = 3;
    ///The patch version of Vulkan loaded.
    pub const API_VERSION_PATCH: u32 = 0;

    ///Loads the Vulkan library at runtime using [Entry::load](ash::Entry::load).
    pub fn load() -> Result<InstanceBuilder, InstanceError> {
        let entry = unsafe { ash::Entry::load()? };

        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None)? };

        Ok(InstanceBuilder {
            entry,
            application_name: c"vkframe application".to_owned(),
            validation: false,
            enabled_extensions: Vec::new(),
            enabled_layers: Vec::new(),
            available_layers,
            available_extensions,
        })
    }

    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }

    ///Returns true if the physical device supports timeline semaphores and synchronization2. Both are
    /// required by every device vkframe creates.
    pub fn supports_sync_features(&self, physical_device: vk::PhysicalDevice) -> bool {
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features12)
            .push_next(&mut features13);
        unsafe {
            self.inner
                .get_physical_device_features2(physical_device, &mut features2)
        };
        features12.timeline_semaphore == vk::TRUE && features13.synchronization2 == vk::TRUE
    }
}

pub trait GetDeviceFilter {
    fn create_physical_device_filter(&self) -> Result<PhysicalDeviceFilter, InstanceError>;
}

impl GetDeviceFilter for Arc<Instance> {
    fn create_physical_device_filter(&self) -> Result<PhysicalDeviceFilter, InstanceError> {
        let devices = unsafe { self.inner.enumerate_physical_devices()? };
        Ok(PhysicalDeviceFilter::new(&self.inner, devices))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_messenger.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.inner.destroy_instance(None);
        }
    }
}

use std::{cmp::Ordering, sync::Arc};

use ash::vk;

use smallvec::smallvec;

use crate::{error::DeviceError, resources::SharingMode};

use super::{DeviceBuilder, QueueBuilder};

///Queue family indices for the three roles a [Device](super::Device) serves. Families may coincide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    pub compute: u32,
}

impl QueueFamilies {
    ///Finds the families for each role.
    ///
    /// - graphics: the first family that supports graphics.
    /// - compute: the first compute family without graphics support, or the first compute family if there is no dedicated one.
    /// - present: the graphics family if it can present, otherwise the first family that can.
    ///
    /// `can_present` is queried per family index. For headless setups pass `|_| true`, which selects the graphics family.
    pub fn select(
        families: &[vk::QueueFamilyProperties],
        mut can_present: impl FnMut(u32) -> bool,
    ) -> Result<Self, DeviceError> {
        let with_flags = |flags: vk::QueueFlags| {
            families
                .iter()
                .position(|f| f.queue_count > 0 && f.queue_flags.contains(flags))
                .map(|i| i as u32)
        };

        let graphics =
            with_flags(vk::QueueFlags::GRAPHICS).ok_or(DeviceError::MissingQueueFamily("graphics"))?;

        let compute = families
            .iter()
            .position(|f| {
                f.queue_count > 0
                    && f.queue_flags.contains(vk::QueueFlags::COMPUTE)
                    && !f.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            })
            .map(|i| i as u32)
            .or_else(|| with_flags(vk::QueueFlags::COMPUTE))
            .ok_or(DeviceError::MissingQueueFamily("compute"))?;

        let present = if can_present(graphics) {
            graphics
        } else {
            (0..families.len() as u32)
                .find(|idx| families[*idx as usize].queue_count > 0 && can_present(*idx))
                .ok_or(DeviceError::MissingQueueFamily("present"))?
        };

        Ok(QueueFamilies {
            graphics,
            present,
            compute,
        })
    }

    ///All distinct families, in ascending order.
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics, self.present, self.compute];
        families.sort_unstable();
        families.dedup();
        families
    }

    ///Sharing mode of swapchain images. They are written on the graphics family and read by the present family, so
    /// they are shared concurrently if those differ.
    pub fn swapchain_sharing(&self) -> SharingMode {
        if self.graphics == self.present {
            SharingMode::Exclusive
        } else {
            SharingMode::Concurrent {
                queue_family_indices: smallvec![self.graphics, self.present],
            }
        }
    }
}

///Collection off all properties for this physical device. Can be used to easily create a [DeviceBuilder](DeviceBuilder).
/// Is usually acquired from a [PhysicalDeviceFilter](PhysicalDeviceFilter), or by using `new`.
pub struct PhyDeviceProperties {
    pub phydev: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_properties: Vec<vk::QueueFamilyProperties>,
}

impl PhyDeviceProperties {
    pub fn new(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let queue_properties =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        PhyDeviceProperties {
            phydev: physical_device,
            properties,
            queue_properties,
        }
    }

    ///creates a device builder that creates one queue for each distinct family in `families`.
    pub fn into_device_builder(
        self,
        instance: Arc<crate::context::Instance>,
        families: QueueFamilies,
    ) -> DeviceBuilder {
        let queues = families
            .unique()
            .into_iter()
            .map(|idx| QueueBuilder {
                family_index: idx,
                properties: self.queue_properties[idx as usize],
                priorities: vec![1.0],
            })
            .collect();

        DeviceBuilder::new(instance, self.phydev, families, queues)
    }
}

///Filter that lets you select a sub-set of all physical devices.
pub struct PhysicalDeviceFilter {
    ///All available devices.
    pub pdevices: Vec<PhyDeviceProperties>,
}

impl PhysicalDeviceFilter {
    pub fn new(instance: &ash::Instance, phydevices: Vec<vk::PhysicalDevice>) -> Self {
        PhysicalDeviceFilter {
            pdevices: phydevices
                .into_iter()
                .map(|phy| PhyDeviceProperties::new(instance, phy))
                .collect(),
        }
    }

    ///Custom filter on the cached properties
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&PhyDeviceProperties) -> bool,
    {
        self.pdevices = self.pdevices.into_iter().filter(filter).collect();
        self
    }

    ///Sorts the candidates by preference. Discrete GPUs first, then integrated ones, then anything else.
    pub fn sort_by_type(mut self) -> Self {
        self.pdevices.sort_by(|a, b| {
            device_type_rank(a.properties.device_type).cmp(&device_type_rank(b.properties.device_type))
        });
        self
    }

    ///Releases the current filtered physical devices.
    pub fn release(self) -> Vec<PhyDeviceProperties> {
        self.pdevices
    }
}

fn device_type_rank(ty: vk::PhysicalDeviceType) -> Ordering {
    match ty {
        vk::PhysicalDeviceType::DISCRETE_GPU => Ordering::Less,
        vk::PhysicalDeviceType::INTEGRATED_GPU => Ordering::Equal,
        _ => Ordering::Greater,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_dedicated_compute() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        let selected = QueueFamilies::select(&families, |_| true).unwrap();
        assert_eq!(
            selected,
            QueueFamilies {
                graphics: 0,
                present: 0,
                compute: 2
            }
        );
        assert_eq!(selected.unique(), vec![0, 2]);
    }

    #[test]
    fn shares_single_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let selected = QueueFamilies::select(&families, |_| true).unwrap();
        assert_eq!(selected.graphics, selected.compute);
        assert_eq!(selected.unique(), vec![0]);
    }

    #[test]
    fn present_falls_back_to_other_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
        ];
        let selected = QueueFamilies::select(&families, |idx| idx == 1).unwrap();
        assert_eq!(selected.present, 1);
        assert_eq!(selected.unique(), vec![0, 1]);
    }

    #[test]
    fn swapchain_shared_between_graphics_and_present() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
        ];
        let split = QueueFamilies::select(&families, |idx| idx == 1).unwrap();
        assert_eq!(
            split.swapchain_sharing(),
            SharingMode::Concurrent {
                queue_family_indices: smallvec![0, 1]
            }
        );

        //a separate compute family does not matter for presentation
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let shared = QueueFamilies::select(&families, |_| true).unwrap();
        assert_eq!(shared.compute, 1);
        assert_eq!(shared.swapchain_sharing(), SharingMode::Exclusive);
    }

    #[test]
    fn missing_graphics_is_an_error() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert!(matches!(
            QueueFamilies::select(&families, |_| true),
            Err(DeviceError::MissingQueueFamily("graphics"))
        ));
    }

    #[test]
    fn discrete_sorts_first() {
        let mut ranks = [
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        ranks.sort_by_key(|t| device_type_rank(*t));
        assert_eq!(ranks[0], vk::PhysicalDeviceType::DISCRETE_GPU);
        assert_eq!(ranks[2], vk::PhysicalDeviceType::CPU);
    }
}

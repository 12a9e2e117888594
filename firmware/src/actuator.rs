#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Build-time selection of the actuator this image drives.
//!
//! Exactly one of the `brake`, `steering` or `throttle` features must be
//! enabled; `throttle` is the default.

#[cfg(any(
    all(feature = "brake", feature = "steering"),
    all(feature = "brake", feature = "throttle"),
    all(feature = "steering", feature = "throttle"),
))]
compile_error!("enable exactly one of the `brake`, `steering` or `throttle` features");

#[cfg(not(any(feature = "brake", feature = "steering", feature = "throttle")))]
compile_error!("enable one of the `brake`, `steering` or `throttle` features");

#[cfg(feature = "brake")]
pub type Selected = actuator_core::actuator::Brake;

#[cfg(feature = "steering")]
pub type Selected = actuator_core::actuator::Steering;

#[cfg(feature = "throttle")]
pub type Selected = actuator_core::actuator::Throttle;

#[cfg(target_os = "none")]
pub type FirmwareCore = actuator_core::control::ControlCore<
    Selected,
    crate::hw::BoardHardware,
    crate::hw::flash_store::PageConfigStore<crate::hw::flash_store::InternalFlash>,
>;

#[cfg(test)]
mod tests {
    use actuator_core::actuator::Actuator;

    use super::Selected;

    #[test]
    fn selected_actuator_owns_a_module_id_block() {
        let ids = <Selected as Actuator>::MODULE.ids();
        assert_eq!(ids.disable, ids.enable + 1);
        assert_eq!(ids.report, ids.enable + 3);
    }
}

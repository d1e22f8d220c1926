//! Place-of-service resolution.
//!
//! Order: explicit `pos` on the component, then inference from the
//! setting (HOPD -> 22, ASC -> 24, office -> 11), then default facility
//! with a trace warning. Strict mode fails instead of defaulting.

use crate::error::{PricingError, Result};
use crate::types::{PlanComponent, Setting};

pub const POS_OFFICE: u8 = 11;
pub const POS_HOPD: u8 = 22;
pub const POS_ASC: u8 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosResolution {
    pub pos: u8,
    pub warning: Option<String>,
}

pub fn resolve_pos(component: &PlanComponent, strict: bool) -> Result<PosResolution> {
    if let Some(pos) = component.pos {
        return Ok(PosResolution { pos, warning: None });
    }

    let inferred = match component.setting {
        Setting::Outpatient => Some(POS_HOPD),
        Setting::AmbulatorySurgical => Some(POS_ASC),
        Setting::Professional if !component.facility_component => Some(POS_OFFICE),
        _ => None,
    };
    if let Some(pos) = inferred {
        return Ok(PosResolution { pos, warning: None });
    }

    if strict {
        return Err(PricingError::PosRequired { code: component.code.clone() });
    }
    Ok(PosResolution {
        pos: POS_HOPD,
        warning: Some(format!(
            "POS missing on {}; defaulted to facility ({POS_HOPD})",
            component.code
        )),
    })
}

/// Whether a POS prices with the facility PE column under MPFS.
pub fn is_facility_pos(pos: u8) -> bool {
    matches!(pos, 19 | 21 | 22 | 23 | 24 | 26 | 31 | 51 | 61)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(setting: Setting, pos: Option<u8>, facility: bool) -> PlanComponent {
        PlanComponent {
            code: "99213".into(),
            setting,
            units: 1,
            utilization_weight: 1.0,
            professional_component: true,
            facility_component: facility,
            modifiers: Vec::new(),
            pos,
            ndc: None,
            wastage_units: None,
        }
    }

    #[test]
    fn explicit_pos_wins() {
        let c = component(Setting::Professional, Some(21), true);
        assert_eq!(resolve_pos(&c, true).unwrap(), PosResolution { pos: 21, warning: None });
    }

    #[test]
    fn setting_inference() {
        let c = component(Setting::Outpatient, None, true);
        assert_eq!(resolve_pos(&c, true).unwrap().pos, POS_HOPD);
        let c = component(Setting::AmbulatorySurgical, None, true);
        assert_eq!(resolve_pos(&c, true).unwrap().pos, POS_ASC);
        let c = component(Setting::Professional, None, false);
        assert_eq!(resolve_pos(&c, true).unwrap().pos, POS_OFFICE);
    }

    #[test]
    fn default_facility_carries_warning() {
        let c = component(Setting::Professional, None, true);
        let resolved = resolve_pos(&c, false).unwrap();
        assert_eq!(resolved.pos, POS_HOPD);
        assert!(resolved.warning.is_some());
    }

    #[test]
    fn strict_mode_fails_instead_of_defaulting() {
        let c = component(Setting::Professional, None, true);
        assert!(matches!(resolve_pos(&c, true), Err(PricingError::PosRequired { .. })));
    }
}

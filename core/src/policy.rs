use std::fmt;

use bitflags::bitflags;

use crate::errors::PolicyError;

bitflags! {
    /// Capabilities held by an overlay, or required by an overlayable target resource
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PolicyFlags: u32 {
        const PUBLIC = 1 << 0;
        const SYSTEM = 1 << 1;
        const VENDOR = 1 << 2;
        const PRODUCT = 1 << 3;
        const SIGNATURE = 1 << 4;
        const ODM = 1 << 5;
        const OEM = 1 << 6;
        const ACTOR = 1 << 7;
    }
}

const POLICY_NAMES: [(&str, PolicyFlags); 8] = [
    ("public", PolicyFlags::PUBLIC),
    ("system", PolicyFlags::SYSTEM),
    ("vendor", PolicyFlags::VENDOR),
    ("product", PolicyFlags::PRODUCT),
    ("signature", PolicyFlags::SIGNATURE),
    ("odm", PolicyFlags::ODM),
    ("oem", PolicyFlags::OEM),
    ("actor", PolicyFlags::ACTOR),
];

/// Fold policy names into a bitmask, the order and repetitions of names don't matter
pub fn parse_policies<I, S>(names: I) -> Result<PolicyFlags, PolicyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().try_fold(PolicyFlags::empty(), |acc, name| {
        let name = name.as_ref();
        POLICY_NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|&(_, flag)| acc | flag)
            .ok_or_else(|| PolicyError::UnknownPolicy(name.to_owned()))
    })
}

/// Whether an overlay holding `overlay` may replace a target resource that requires `target`
///
/// A target resource without any policy is only replaceable when overlayable
/// declarations are not enforced.
#[inline]
pub fn overlay_allowed(target: PolicyFlags, overlay: PolicyFlags, enforce_overlayable: bool) -> bool {
    target.intersects(overlay) || (target.is_empty() && !enforce_overlayable)
}

impl fmt::Display for PolicyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = POLICY_NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect();

        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_names() {
        assert_eq!(
            parse_policies(["system", "vendor"]).unwrap(),
            PolicyFlags::SYSTEM | PolicyFlags::VENDOR
        );
        assert_eq!(parse_policies(["actor"]).unwrap().bits(), 0x80);
        assert_eq!(parse_policies(Vec::<String>::new()).unwrap(), PolicyFlags::empty());
    }

    #[test]
    fn parsing_is_order_independent_and_idempotent() {
        let a = parse_policies(["odm", "public", "oem"]).unwrap();
        let b = parse_policies(["oem", "odm", "public", "odm", "public"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_name() {
        assert_eq!(
            parse_policies(["system", "root"]),
            Err(PolicyError::UnknownPolicy("root".to_owned()))
        );
        // names are case sensitive
        assert!(parse_policies(["System"]).is_err());
    }

    #[test]
    fn allowed_on_intersection() {
        let system = PolicyFlags::SYSTEM;
        let vendor = PolicyFlags::VENDOR;

        assert!(!overlay_allowed(system, vendor, true));
        assert!(overlay_allowed(system, system | vendor, true));
        assert!(!overlay_allowed(system, vendor, false));
    }

    #[test]
    fn empty_target_policy() {
        assert!(overlay_allowed(PolicyFlags::empty(), PolicyFlags::PUBLIC, false));
        assert!(!overlay_allowed(PolicyFlags::empty(), PolicyFlags::PUBLIC, true));
    }

    #[test]
    fn display_names() {
        assert_eq!((PolicyFlags::SYSTEM | PolicyFlags::ODM).to_string(), "system|odm");
        assert_eq!(PolicyFlags::empty().to_string(), "none");
    }
}

//! Surface materials and the contact parameters derived from pairs of them.
//!
//! A [`Material`] is only an identity. What the narrowphase needs is the
//! [`ContactMaterial`] for the pair of surfaces touching: friction,
//! restitution, and the stiffness/relaxation of the generated equations.
//! [`MaterialTable`] is the lookup from an unordered material pair to those
//! parameters, with a fallback for shapes without a material or pairs that
//! were never registered.

use std::sync::atomic::{AtomicU32, Ordering};

use hashbrown::HashMap;

use crate::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

static NEXT_MATERIAL_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a surface material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Create a material ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A surface material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Unique identity.
    pub id: MaterialId,
}

impl Material {
    /// Create a material with a fresh process-wide unique id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: MaterialId(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

/// Contact parameters for a pair of materials.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactMaterial {
    /// First material of the pair.
    pub material_a: MaterialId,
    /// Second material of the pair.
    pub material_b: MaterialId,
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Restitution coefficient in `[0, 1]`.
    pub restitution: f64,
    /// Stiffness of contact equations.
    pub stiffness: f64,
    /// Relaxation (number of timesteps to resolve violation) of contact equations.
    pub relaxation: f64,
    /// Stiffness of friction equations.
    pub friction_stiffness: f64,
    /// Relaxation of friction equations.
    pub friction_relaxation: f64,
    /// Tangential surface speed, as on a conveyor belt.
    pub surface_velocity: f64,
    /// Overlap kept between resting shapes.
    pub contact_skin_size: f64,
}

impl Default for ContactMaterial {
    fn default() -> Self {
        Self::new(MaterialId::default(), MaterialId::default())
    }
}

impl ContactMaterial {
    /// Create default contact parameters for a material pair.
    #[must_use]
    pub fn new(material_a: MaterialId, material_b: MaterialId) -> Self {
        Self {
            material_a,
            material_b,
            friction: 0.3,
            restitution: 0.0,
            stiffness: 1e6,
            relaxation: 4.0,
            friction_stiffness: 1e6,
            friction_relaxation: 4.0,
            surface_velocity: 0.0,
            contact_skin_size: 0.005,
        }
    }

    /// Ice-like contact: no friction.
    #[must_use]
    pub fn frictionless(material_a: MaterialId, material_b: MaterialId) -> Self {
        Self::new(material_a, material_b).with_friction(0.0)
    }

    /// Bouncy contact.
    #[must_use]
    pub fn bouncy(material_a: MaterialId, material_b: MaterialId) -> Self {
        Self::new(material_a, material_b).with_restitution(0.9)
    }

    /// Set friction.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Set restitution.
    #[must_use]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set contact stiffness and relaxation.
    #[must_use]
    pub fn with_contact_compliance(mut self, stiffness: f64, relaxation: f64) -> Self {
        self.stiffness = stiffness;
        self.relaxation = relaxation;
        self
    }

    /// Set friction stiffness and relaxation.
    #[must_use]
    pub fn with_friction_compliance(mut self, stiffness: f64, relaxation: f64) -> Self {
        self.friction_stiffness = stiffness;
        self.friction_relaxation = relaxation;
        self
    }

    /// Set the surface velocity.
    #[must_use]
    pub fn with_surface_velocity(mut self, surface_velocity: f64) -> Self {
        self.surface_velocity = surface_velocity;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for negative friction, restitution
    /// outside `[0, 1]`, or non-positive stiffness.
    pub fn validate(&self) -> Result<()> {
        if !(self.friction >= 0.0) {
            return Err(SimError::invalid_config("friction cannot be negative"));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config(
                "restitution must be between 0 and 1",
            ));
        }
        if !(self.stiffness > 0.0) || !(self.friction_stiffness > 0.0) {
            return Err(SimError::invalid_config("stiffness must be positive"));
        }
        if self.relaxation < 0.0 || self.friction_relaxation < 0.0 {
            return Err(SimError::invalid_config("relaxation cannot be negative"));
        }
        if self.contact_skin_size < 0.0 {
            return Err(SimError::invalid_config(
                "contact_skin_size cannot be negative",
            ));
        }
        Ok(())
    }

    fn key(&self) -> u64 {
        pair_key(self.material_a, self.material_b)
    }
}

fn pair_key(a: MaterialId, b: MaterialId) -> u64 {
    let (lo, hi) = if a.0 <= b.0 { (a.0, b.0) } else { (b.0, a.0) };
    (u64::from(lo) << 32) | u64::from(hi)
}

/// Lookup of contact parameters by unordered material pair.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialTable {
    default: ContactMaterial,
    entries: HashMap<u64, ContactMaterial>,
}

impl MaterialTable {
    /// Create a table that falls back to `default`.
    #[must_use]
    pub fn new(default: ContactMaterial) -> Self {
        Self {
            default,
            entries: HashMap::new(),
        }
    }

    /// Register a contact material, replacing any previous one for the pair.
    pub fn insert(&mut self, material: ContactMaterial) -> Option<ContactMaterial> {
        self.entries.insert(material.key(), material)
    }

    /// Remove the entry for a pair.
    pub fn remove(&mut self, a: MaterialId, b: MaterialId) -> Option<ContactMaterial> {
        self.entries.remove(&pair_key(a, b))
    }

    /// Contact parameters for two shape materials.
    ///
    /// Falls back to the default when either side has no material or the pair
    /// is not registered.
    #[must_use]
    pub fn get(&self, a: Option<MaterialId>, b: Option<MaterialId>) -> &ContactMaterial {
        match (a, b) {
            (Some(a), Some(b)) => self.entries.get(&pair_key(a, b)).unwrap_or(&self.default),
            _ => &self.default,
        }
    }

    /// The fallback parameters.
    #[must_use]
    pub fn default_material(&self) -> &ContactMaterial {
        &self.default
    }

    /// Replace the fallback parameters.
    pub fn set_default(&mut self, default: ContactMaterial) {
        self.default = default;
    }

    /// Number of registered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pair is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

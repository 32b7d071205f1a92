//! Shape-pair dispatch.
//!
//! Pairs are keyed by their two [`ShapeType`]s in canonical order, so each
//! unordered pair has exactly one handler and one entry in the table.

use sim2d_types::ShapeType;

use super::geometry::{self, Manifold};
use super::polygon::{capsule_capsule, plane_polygon, plane_segment, polygon_capsule, polygon_polygon};
use super::round::{plane_round, round_polygon, round_round, round_segment};
use super::ShapeRef;
use crate::error::{CollisionError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Contact routine for a class of shape pairs.
///
/// "Round" covers circles and particles, "polygon" covers convex polygons,
/// boxes and lines (as two-sided polygons), "segment" covers lines and
/// capsules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PairHandler {
    /// Circle-circle, circle-particle.
    RoundRound,
    /// Circle-plane, particle-plane.
    RoundPlane,
    /// Circle or particle against convex or box.
    RoundPolygon,
    /// Circle or particle against line or capsule.
    RoundSegment,
    /// Plane against convex or box.
    PlanePolygon,
    /// Plane against line or capsule.
    PlaneSegment,
    /// Convex, box and line against each other.
    PolygonPolygon,
    /// Convex, box or line against capsule.
    PolygonCapsule,
    /// Capsule-capsule.
    CapsuleCapsule,
    /// Pairs that never touch: plane-plane, particle-particle,
    /// particle-line, line-line.
    Disjoint,
}

fn is_round(t: ShapeType) -> bool {
    matches!(t, ShapeType::Circle | ShapeType::Particle)
}

fn is_polygon(t: ShapeType) -> bool {
    matches!(t, ShapeType::Convex | ShapeType::Box | ShapeType::Line)
}

fn is_segment(t: ShapeType) -> bool {
    matches!(t, ShapeType::Line | ShapeType::Capsule)
}

impl PairHandler {
    /// Whether the handler can run on the canonical pair `(a, b)`, `a <= b`.
    #[must_use]
    pub fn accepts(self, a: ShapeType, b: ShapeType) -> bool {
        match self {
            Self::RoundRound => is_round(a) && is_round(b),
            Self::RoundPlane => is_round(a) && b == ShapeType::Plane,
            Self::RoundPolygon => is_round(a) && is_polygon(b),
            Self::RoundSegment => is_round(a) && is_segment(b),
            Self::PlanePolygon => a == ShapeType::Plane && is_polygon(b),
            Self::PlaneSegment => a == ShapeType::Plane && is_segment(b),
            Self::PolygonPolygon => is_polygon(a) && is_polygon(b),
            Self::PolygonCapsule => is_polygon(a) && b == ShapeType::Capsule,
            Self::CapsuleCapsule => a == ShapeType::Capsule && b == ShapeType::Capsule,
            Self::Disjoint => true,
        }
    }

    /// Run the routine on a canonical pair. `None` if a shape is not of a
    /// kind the handler reads.
    pub(crate) fn run(self, first: &ShapeRef<'_>, second: &ShapeRef<'_>, out: &mut Manifold) -> Option<()> {
        match self {
            Self::RoundRound => {
                let (c1, r1) = geometry::round(first)?;
                let (c2, r2) = geometry::round(second)?;
                round_round(c1, r1, c2, r2, out);
            }
            Self::RoundPlane => {
                let (center, radius) = geometry::round(first)?;
                let (origin, normal) = geometry::plane(second)?;
                out.reversed(|m| plane_round(origin, normal, center, radius, m));
            }
            Self::RoundPolygon => {
                let (center, radius) = geometry::round(first)?;
                let poly = geometry::polygon(second)?;
                round_polygon(center, radius, &poly, out);
            }
            Self::RoundSegment => {
                let (center, radius) = geometry::round(first)?;
                let (p0, p1, r) = geometry::segment(second)?;
                round_segment(center, radius, p0, p1, r, out);
            }
            Self::PlanePolygon => {
                let (origin, normal) = geometry::plane(first)?;
                let poly = geometry::polygon(second)?;
                plane_polygon(origin, normal, &poly, out);
            }
            Self::PlaneSegment => {
                let (origin, normal) = geometry::plane(first)?;
                let (p0, p1, r) = geometry::segment(second)?;
                plane_segment(origin, normal, p0, p1, r, out);
            }
            Self::PolygonPolygon => {
                let a = geometry::polygon(first)?;
                let b = geometry::polygon(second)?;
                polygon_polygon(&a, &b, out);
            }
            Self::PolygonCapsule => {
                let poly = geometry::polygon(first)?;
                let (p0, p1, r) = geometry::segment(second)?;
                polygon_capsule(&poly, p0, p1, r, out);
            }
            Self::CapsuleCapsule => {
                let a = geometry::segment(first)?;
                let b = geometry::segment(second)?;
                capsule_capsule(a, b, out);
            }
            Self::Disjoint => {}
        }
        Some(())
    }
}

/// Dispatch table over every unordered pair of shape types.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PairTable {
    entries: [[Option<PairHandler>; ShapeType::COUNT]; ShapeType::COUNT],
}

impl Default for PairTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl PairTable {
    /// A table with no handlers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: [[None; ShapeType::COUNT]; ShapeType::COUNT],
        }
    }

    /// The full table of built-in handlers.
    #[must_use]
    pub fn standard() -> Self {
        use PairHandler as H;
        use ShapeType as S;

        let mut table = Self::empty();
        let standard = [
            (S::Circle, S::Circle, H::RoundRound),
            (S::Circle, S::Particle, H::RoundRound),
            (S::Circle, S::Plane, H::RoundPlane),
            (S::Circle, S::Convex, H::RoundPolygon),
            (S::Circle, S::Line, H::RoundSegment),
            (S::Circle, S::Box, H::RoundPolygon),
            (S::Circle, S::Capsule, H::RoundSegment),
            (S::Particle, S::Particle, H::Disjoint),
            (S::Particle, S::Plane, H::RoundPlane),
            (S::Particle, S::Convex, H::RoundPolygon),
            (S::Particle, S::Line, H::Disjoint),
            (S::Particle, S::Box, H::RoundPolygon),
            (S::Particle, S::Capsule, H::RoundSegment),
            (S::Plane, S::Plane, H::Disjoint),
            (S::Plane, S::Convex, H::PlanePolygon),
            (S::Plane, S::Line, H::PlaneSegment),
            (S::Plane, S::Box, H::PlanePolygon),
            (S::Plane, S::Capsule, H::PlaneSegment),
            (S::Convex, S::Convex, H::PolygonPolygon),
            (S::Convex, S::Line, H::PolygonPolygon),
            (S::Convex, S::Box, H::PolygonPolygon),
            (S::Convex, S::Capsule, H::PolygonCapsule),
            (S::Line, S::Line, H::Disjoint),
            (S::Line, S::Box, H::PolygonPolygon),
            (S::Line, S::Capsule, H::PolygonCapsule),
            (S::Box, S::Box, H::PolygonPolygon),
            (S::Box, S::Capsule, H::PolygonCapsule),
            (S::Capsule, S::Capsule, H::CapsuleCapsule),
        ];
        for (a, b, handler) in standard {
            table.entries[a.index()][b.index()] = Some(handler);
        }
        table
    }

    /// Register a handler for the unordered pair `(a, b)`.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::UnsupportedPair`] if the handler cannot read
    /// these shape types.
    pub fn register(&mut self, a: ShapeType, b: ShapeType, handler: PairHandler) -> Result<()> {
        let (a, b) = canonical(a, b);
        if !handler.accepts(a, b) {
            return Err(CollisionError::UnsupportedPair { a, b });
        }
        self.entries[a.index()][b.index()] = Some(handler);
        Ok(())
    }

    /// Remove the handler for `(a, b)`.
    pub fn unregister(&mut self, a: ShapeType, b: ShapeType) -> Option<PairHandler> {
        let (a, b) = canonical(a, b);
        self.entries[a.index()][b.index()].take()
    }

    /// Handler for the unordered pair `(a, b)`.
    #[must_use]
    pub fn get(&self, a: ShapeType, b: ShapeType) -> Option<PairHandler> {
        let (a, b) = canonical(a, b);
        self.entries[a.index()][b.index()]
    }

    /// Check that every unordered pair has a handler.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::IncompleteDispatch`] listing the missing pairs.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<_> = ShapeType::ALL
            .iter()
            .enumerate()
            .flat_map(|(i, &a)| ShapeType::ALL[i..].iter().map(move |&b| (a, b)))
            .filter(|&(a, b)| self.entries[a.index()][b.index()].is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CollisionError::IncompleteDispatch { missing })
        }
    }
}

/// Order a pair by shape type.
#[must_use]
pub fn canonical(a: ShapeType, b: ShapeType) -> (ShapeType, ShapeType) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_total() {
        let table = PairTable::standard();
        assert!(table.validate().is_ok());
        for &a in &ShapeType::ALL {
            for &b in &ShapeType::ALL {
                let handler = table.get(a, b).unwrap();
                let (x, y) = canonical(a, b);
                assert!(handler.accepts(x, y), "{a}-{b} -> {handler:?}");
            }
        }
    }

    #[test]
    fn test_lookup_is_symmetric() {
        let table = PairTable::standard();
        assert_eq!(
            table.get(ShapeType::Capsule, ShapeType::Plane),
            Some(PairHandler::PlaneSegment)
        );
        assert_eq!(
            table.get(ShapeType::Box, ShapeType::Line),
            table.get(ShapeType::Line, ShapeType::Box)
        );
    }

    #[test]
    fn test_register_rejects_mismatched_handler() {
        let mut table = PairTable::empty();
        let err = table
            .register(ShapeType::Plane, ShapeType::Circle, PairHandler::RoundRound)
            .unwrap_err();
        assert_eq!(
            err,
            CollisionError::UnsupportedPair {
                a: ShapeType::Circle,
                b: ShapeType::Plane
            }
        );
        assert!(table
            .register(ShapeType::Plane, ShapeType::Circle, PairHandler::RoundPlane)
            .is_ok());
    }

    #[test]
    fn test_validate_reports_missing() {
        let mut table = PairTable::standard();
        table.unregister(ShapeType::Line, ShapeType::Capsule);
        match table.validate() {
            Err(CollisionError::IncompleteDispatch { missing }) => {
                assert_eq!(missing, vec![(ShapeType::Line, ShapeType::Capsule)]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(PairTable::empty().validate().unwrap_err().to_string().matches('-').count(), 28);
    }
}

//! Concrete machine profiles.
//!
//! Naming convention shared by the profiles here: jaws are `jaw_x_0`,
//! `jaw_x_1`, `jaw_y_0`, `jaw_y_1`; leaf banks are repeat-expanded under the
//! prefixes `mlc_1` (positive-x side) and `mlc_2` (negative-x side), so the
//! individual leaves are `mlc_1_0`, `mlc_1_1`, ...

use crate::error::FieldError;
use crate::field::{ISOCENTER_DISTANCE, MachineProfile, rounded_leaf_position};
use crate::volume::Volume;

/// An Elekta-style machine head: rounded 150 mm leaf tips with the bank
/// plane at 330.8, rounded X jaws at 412, and thin Y jaws at 569 set by
/// plain projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreciseProfile;

impl PreciseProfile {
    const LEAF_RADIUS: f64 = 150.0;
    const LEAF_PLANE: f64 = 330.8;
    const JAW_RADIUS: f64 = 70.0;
    const JAW_PLANE: f64 = 412.0;
    const Y_JAW_PLANE: f64 = 569.0;

    fn leaf_position(field_size: f64) -> f64 {
        rounded_leaf_position(
            Self::LEAF_RADIUS,
            Self::LEAF_PLANE,
            field_size,
            ISOCENTER_DISTANCE,
        )
    }

    fn jaw_position(field_size: f64) -> f64 {
        rounded_leaf_position(
            Self::JAW_RADIUS,
            Self::JAW_PLANE,
            field_size,
            ISOCENTER_DISTANCE,
        )
    }

    fn y_jaw_position(field_size: f64) -> f64 {
        field_size * ((ISOCENTER_DISTANCE - Self::Y_JAW_PLANE) / ISOCENTER_DISTANCE)
    }

    fn set_x(head: &mut Volume, name: &str, value: f64) -> Result<(), FieldError> {
        head.daughter_mut(name)
            .ok_or_else(|| FieldError::UnknownVolume {
                name: name.to_string(),
            })?
            .set_x_position(value);
        Ok(())
    }

    fn set_y(head: &mut Volume, name: &str, value: f64) -> Result<(), FieldError> {
        head.daughter_mut(name)
            .ok_or_else(|| FieldError::UnknownVolume {
                name: name.to_string(),
            })?
            .set_y_position(value);
        Ok(())
    }
}

impl MachineProfile for PreciseProfile {
    fn rectangular_field_jaws(
        &self,
        head: &mut Volume,
        x1: f64,
        x2: f64,
        y1: f64,
        y2: f64,
    ) -> Result<(), FieldError> {
        Self::set_x(head, "jaw_x_1", Self::jaw_position(x1))?;
        Self::set_x(head, "jaw_x_0", Self::jaw_position(x2))?;
        Self::set_y(head, "jaw_y_0", Self::y_jaw_position(y1))?;
        Self::set_y(head, "jaw_y_1", Self::y_jaw_position(y2))?;
        Ok(())
    }

    fn rectangular_field_mlc(
        &self,
        head: &mut Volume,
        x1: f64,
        x2: f64,
        _y1: f64,
        _y2: f64,
    ) -> Result<(), FieldError> {
        for (name, leaf) in head.daughters.iter_mut() {
            if name.starts_with("mlc_1") {
                leaf.set_x_position(Self::leaf_position(x1));
            } else if name.starts_with("mlc_2") {
                leaf.set_x_position(Self::leaf_position(x2));
            }
        }
        Ok(())
    }

    fn arbitrary_field_mlc(
        &self,
        head: &mut Volume,
        bank1: &[f64],
        bank2: &[f64],
    ) -> Result<(), FieldError> {
        for (i, position) in bank1.iter().enumerate() {
            Self::set_x(head, &format!("mlc_1_{i}"), Self::leaf_position(*position))?;
        }
        for (i, position) in bank2.iter().enumerate() {
            Self::set_x(head, &format!("mlc_2_{i}"), Self::leaf_position(*position))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_head(leaf_pairs: usize) -> Volume {
        let mut head = Volume::new("head");
        for name in ["jaw_x_0", "jaw_x_1", "jaw_y_0", "jaw_y_1"] {
            head.insert_daughter(Volume::new(name));
        }
        for bank in ["mlc_1", "mlc_2"] {
            for i in 0..leaf_pairs {
                head.insert_daughter(Volume::new(&format!("{bank}_{i}")));
            }
        }
        head
    }

    #[test]
    fn rectangular_jaws_use_rounded_positions_in_x() {
        let mut head = test_head(0);
        PreciseProfile
            .rectangular_field_jaws(&mut head, 50.0, -50.0, 40.0, -40.0)
            .unwrap();

        let expected = PreciseProfile::jaw_position(50.0);
        assert_eq!(head.daughter("jaw_x_1").unwrap().x_position(), expected);
        assert_eq!(
            head.daughter("jaw_x_0").unwrap().x_position(),
            PreciseProfile::jaw_position(-50.0)
        );
    }

    #[test]
    fn rectangular_jaws_project_plainly_in_y() {
        let mut head = test_head(0);
        PreciseProfile
            .rectangular_field_jaws(&mut head, 50.0, -50.0, 40.0, -40.0)
            .unwrap();

        let factor = (1000.0 - 569.0) / 1000.0;
        assert_eq!(head.daughter("jaw_y_0").unwrap().y_position(), 40.0 * factor);
        assert_eq!(
            head.daughter("jaw_y_1").unwrap().y_position(),
            -40.0 * factor
        );
    }

    #[test]
    fn rectangular_mlc_moves_whole_banks() {
        let mut head = test_head(3);
        PreciseProfile
            .rectangular_field_mlc(&mut head, 30.0, -30.0, 0.0, 0.0)
            .unwrap();

        let bank1 = PreciseProfile::leaf_position(30.0);
        let bank2 = PreciseProfile::leaf_position(-30.0);
        for i in 0..3 {
            assert_eq!(
                head.daughter(&format!("mlc_1_{i}")).unwrap().x_position(),
                bank1
            );
            assert_eq!(
                head.daughter(&format!("mlc_2_{i}")).unwrap().x_position(),
                bank2
            );
        }
    }

    #[test]
    fn arbitrary_mlc_sets_each_leaf_pair() {
        let mut head = test_head(3);
        PreciseProfile
            .arbitrary_field_mlc(&mut head, &[10.0, 20.0, 30.0], &[-10.0, -20.0, -30.0])
            .unwrap();

        assert_eq!(
            head.daughter("mlc_1_1").unwrap().x_position(),
            PreciseProfile::leaf_position(20.0)
        );
        assert_eq!(
            head.daughter("mlc_2_2").unwrap().x_position(),
            PreciseProfile::leaf_position(-30.0)
        );
    }

    #[test]
    fn arbitrary_mlc_with_missing_leaf_fails() {
        let mut head = test_head(2);
        let result =
            PreciseProfile.arbitrary_field_mlc(&mut head, &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!(matches!(
            result,
            Err(FieldError::UnknownVolume { name }) if name == "mlc_1_2"
        ));
    }

    #[test]
    fn missing_jaw_fails() {
        let mut head = Volume::new("head");
        let result = PreciseProfile.rectangular_field_jaws(&mut head, 1.0, -1.0, 1.0, -1.0);
        assert!(matches!(result, Err(FieldError::UnknownVolume { .. })));
    }
}

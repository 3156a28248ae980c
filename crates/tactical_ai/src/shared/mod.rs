//! Общие geometry helpers (XZ-плоскость, yaw)
//!
//! Конвенция: yaw = atan2(x, z), forward(yaw) = (sin yaw, 0, cos yaw).
//! Совпадает с `Quat::from_rotation_y(yaw) * Vec3::Z`.

use bevy::math::{Quat, Vec3};

/// Проекция на XZ (y = 0)
pub fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Горизонтальная дистанция между точками
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    horizontal(b - a).length()
}

/// Нормализованное горизонтальное направление `from → to` (None если точки совпадают)
pub fn horizontal_direction(from: Vec3, to: Vec3) -> Option<Vec3> {
    let flat = horizontal(to - from);
    (flat.length_squared() > 1e-6).then(|| flat.normalize())
}

pub fn yaw_of(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}

pub fn forward_from_yaw(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Поворот вектора вокруг Y
pub fn rotate_y(v: Vec3, angle: f32) -> Vec3 {
    Quat::from_rotation_y(angle) * v
}

/// Перпендикуляр влево в XZ
pub fn left_of(direction: Vec3) -> Vec3 {
    Vec3::new(direction.z, 0.0, -direction.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaw_roundtrip_matches_quat() {
        let yaw = 0.7_f32;
        let by_quat = rotate_y(Vec3::Z, yaw);
        let by_formula = forward_from_yaw(yaw);
        assert!((by_quat - by_formula).length() < 1e-5);
        assert!((yaw_of(by_formula) - yaw).abs() < 1e-5);
    }

    #[test]
    fn test_horizontal_direction_ignores_height() {
        let dir = horizontal_direction(Vec3::ZERO, Vec3::new(0.0, 10.0, 4.0));
        assert_eq!(dir, Some(Vec3::Z));
        assert_eq!(horizontal_direction(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0)), None);
    }

    #[test]
    fn test_left_is_perpendicular() {
        let dir = Vec3::new(0.6, 0.0, 0.8);
        assert!(left_of(dir).dot(dir).abs() < 1e-6);
    }
}

// src/features.rs - Landmark sets to numeric features
use crate::observation::{pose_index, Landmark, Observation, HAND_WRIST};
use nalgebra::Vector2;

// Below this length a limb segment is treated as collapsed
const MIN_SEGMENT_LENGTH: f64 = 1e-9;

/// Flattened keypoint coordinates for one frame, immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Geometry the rule classifier reasons about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureGeometry {
    /// Mean of the left and right hip-knee-ankle angles, in degrees.
    pub leg_angle: f64,
    /// Vertical gap between mean shoulder height and mean hip height.
    pub torso_gap: f64,
}

/// Rule-strategy features for one frame. `None` means insufficient evidence.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GeometricFeatures {
    pub hand_distance: Option<f64>,
    pub posture: Option<PostureGeometry>,
}

/// Flattens `(x, y)` of every pose landmark.
///
/// Returns `None` when no body was detected, or a zero vector of
/// `2 * expected_landmarks` when `pad_missing` is set.
pub fn extract_keypoints(
    observation: Option<&Observation>,
    expected_landmarks: usize,
    pad_missing: bool,
) -> Option<FeatureVector> {
    let pose = observation
        .and_then(|o| o.pose.as_ref())
        .filter(|p| !p.is_empty());

    match pose {
        Some(landmarks) => {
            let mut values = Vec::with_capacity(landmarks.len() * 2);
            for lm in landmarks {
                values.push(lm.x);
                values.push(lm.y);
            }
            Some(FeatureVector(values))
        }
        None if pad_missing => Some(FeatureVector::zeros(expected_landmarks * 2)),
        None => None,
    }
}

/// Derives the rule-strategy geometry, refusing to answer when the
/// critical landmarks are occluded or the geometry is degenerate.
pub fn extract_geometry(
    observation: Option<&Observation>,
    min_visibility: f64,
) -> GeometricFeatures {
    let Some(observation) = observation else {
        return GeometricFeatures::default();
    };

    GeometricFeatures {
        hand_distance: hand_distance(observation, min_visibility),
        posture: observation
            .pose
            .as_deref()
            .and_then(|pose| posture_geometry(pose, min_visibility)),
    }
}

fn hand_distance(observation: &Observation, min_visibility: f64) -> Option<f64> {
    if let [first, second, ..] = observation.hands.as_slice() {
        if let (Some(a), Some(b)) = (first.get(HAND_WRIST), second.get(HAND_WRIST)) {
            return Some(distance(a, b));
        }
    }

    // Fall back to the body wrists when the hand detector gave no usable pair
    let pose = observation.pose.as_deref()?;
    let left = visible(pose, pose_index::LEFT_WRIST, min_visibility)?;
    let right = visible(pose, pose_index::RIGHT_WRIST, min_visibility)?;
    Some(distance(left, right))
}

fn posture_geometry(pose: &[Landmark], min_visibility: f64) -> Option<PostureGeometry> {
    use pose_index::*;

    let left_shoulder = visible(pose, LEFT_SHOULDER, min_visibility)?;
    let right_shoulder = visible(pose, RIGHT_SHOULDER, min_visibility)?;
    let left_hip = visible(pose, LEFT_HIP, min_visibility)?;
    let right_hip = visible(pose, RIGHT_HIP, min_visibility)?;
    let left_knee = visible(pose, LEFT_KNEE, min_visibility)?;
    let right_knee = visible(pose, RIGHT_KNEE, min_visibility)?;
    let left_ankle = pose.get(LEFT_ANKLE)?;
    let right_ankle = pose.get(RIGHT_ANKLE)?;

    let left_leg = joint_angle(left_hip, left_knee, left_ankle)?;
    let right_leg = joint_angle(right_hip, right_knee, right_ankle)?;

    let shoulder_y = (left_shoulder.y + right_shoulder.y) / 2.0;
    let hip_y = (left_hip.y + right_hip.y) / 2.0;

    Some(PostureGeometry {
        leg_angle: (left_leg + right_leg) / 2.0,
        torso_gap: (shoulder_y - hip_y).abs(),
    })
}

fn visible(pose: &[Landmark], index: usize, min_visibility: f64) -> Option<&Landmark> {
    pose.get(index).filter(|lm| lm.visibility >= min_visibility)
}

fn point(lm: &Landmark) -> Vector2<f64> {
    Vector2::new(lm.x, lm.y)
}

pub fn distance(a: &Landmark, b: &Landmark) -> f64 {
    (point(a) - point(b)).norm()
}

/// Angle at `b` formed by `a-b-c`, in degrees within `[0, 180]`.
///
/// Returns `None` if either arm has zero length.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> Option<f64> {
    let ba = point(a) - point(b);
    let bc = point(c) - point(b);

    if ba.norm() < MIN_SEGMENT_LENGTH || bc.norm() < MIN_SEGMENT_LENGTH {
        return None;
    }

    let radians = bc.y.atan2(bc.x) - ba.y.atan2(ba.x);
    let mut angle = radians.to_degrees().abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    Some(angle)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::observation::LandmarkSet;

    /// Builds a visible 33-point pose with the given leg angle (degrees)
    /// and shoulder-hip vertical gap.
    pub fn posture(leg_angle: f64, torso_gap: f64) -> LandmarkSet {
        use pose_index::*;

        let mut pose = vec![Landmark::new(0.5, 0.5, 1.0); 33];
        let hip_y = 0.5;
        let shoulder_y = hip_y - torso_gap;

        for (hip, knee, ankle, shoulder, wrist, x) in [
            (LEFT_HIP, LEFT_KNEE, LEFT_ANKLE, LEFT_SHOULDER, LEFT_WRIST, 0.45),
            (RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE, RIGHT_SHOULDER, RIGHT_WRIST, 0.55),
        ] {
            pose[shoulder] = Landmark::new(x, shoulder_y, 1.0);
            pose[hip] = Landmark::new(x, hip_y, 1.0);
            pose[knee] = Landmark::new(x, hip_y + 0.2, 1.0);
            // Rotate the shank away from the thigh so the knee angle is `leg_angle`
            let theta = (180.0 - leg_angle).to_radians();
            let ankle_x = x + 0.2 * theta.sin();
            let ankle_y = hip_y + 0.2 + 0.2 * theta.cos();
            pose[ankle] = Landmark::new(ankle_x, ankle_y, 1.0);
            // Wrists far apart so the fallback hand distance never reads as a clap
            pose[wrist] = Landmark::new(if x < 0.5 { 0.1 } else { 0.9 }, shoulder_y + 0.1, 1.0);
        }
        pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_angle_right_and_straight() {
        let a = Landmark::new(0.0, 1.0, 1.0);
        let b = Landmark::new(0.0, 0.0, 1.0);
        let c = Landmark::new(1.0, 0.0, 1.0);
        assert!((joint_angle(&a, &b, &c).unwrap() - 90.0).abs() < 1e-9);

        let c = Landmark::new(0.0, -1.0, 1.0);
        assert!((joint_angle(&a, &b, &c).unwrap() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_joint_angle_degenerate_segment() {
        let a = Landmark::new(0.2, 0.2, 1.0);
        let c = Landmark::new(0.4, 0.1, 1.0);
        assert_eq!(joint_angle(&a, &a, &c), None);
    }

    #[test]
    fn test_keypoints_flatten_and_padding() {
        let obs = Observation::from_pose(vec![
            Landmark::new(0.1, 0.2, 0.9),
            Landmark::new(0.3, 0.4, 0.1),
        ]);
        let vector = extract_keypoints(Some(&obs), 2, false).unwrap();
        assert_eq!(vector.as_slice(), &[0.1, 0.2, 0.3, 0.4]);

        assert_eq!(extract_keypoints(None, 33, false), None);
        assert_eq!(extract_keypoints(None, 33, true).unwrap(), FeatureVector::zeros(66));
    }

    #[test]
    fn test_posture_geometry_matches_fixture() {
        let obs = Observation::from_pose(fixtures::posture(150.0, 0.3));
        let geometry = extract_geometry(Some(&obs), 0.6).posture.unwrap();
        assert!((geometry.leg_angle - 150.0).abs() < 1e-6);
        assert!((geometry.torso_gap - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_occluded_knee_is_insufficient() {
        let mut pose = fixtures::posture(150.0, 0.3);
        pose[pose_index::LEFT_KNEE].visibility = 0.4;
        let features = extract_geometry(Some(&Observation::from_pose(pose)), 0.6);
        assert!(features.posture.is_none());
    }

    #[test]
    fn test_hand_distance_prefers_hand_sets() {
        let hands = vec![
            vec![Landmark::new(0.40, 0.5, 1.0)],
            vec![Landmark::new(0.43, 0.54, 1.0)],
        ];
        let obs = Observation::from_pose(fixtures::posture(100.0, 0.15)).with_hands(hands);
        let d = extract_geometry(Some(&obs), 0.6).hand_distance.unwrap();
        assert!((d - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_empty_hand_set_falls_back_to_pose_wrists() {
        let mut pose = fixtures::posture(150.0, 0.3);
        pose[pose_index::LEFT_WRIST] = Landmark::new(0.50, 0.3, 1.0);
        pose[pose_index::RIGHT_WRIST] = Landmark::new(0.52, 0.3, 1.0);
        let hands = vec![vec![], vec![Landmark::new(0.43, 0.54, 1.0)]];
        let obs = Observation::from_pose(pose).with_hands(hands);

        let d = extract_geometry(Some(&obs), 0.6).hand_distance.unwrap();
        assert!((d - 0.02).abs() < 1e-9);
    }
}

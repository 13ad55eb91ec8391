use nalgebra::{Rotation3, Vector3};

use crate::skeleton::{Human3D, Keypoint3D, Line3D};

/// 基準ペア（例: 左右の肩）で3D骨格を正面向きに正規化する
///
/// 基準ベクトルの中点を中心に、垂直軸まわりの回転θ1と奥行き軸まわりの
/// 傾きθ2を打ち消し、中点のx座標が0.5になるよう平行移動する。
/// 回転・体の向きに依存しない骨格比較のための前処理。
/// 基準キーポイントが欠けている場合は入力をそのまま返す。
pub fn normalize_baseline(human: &Human3D, baseline: (usize, usize)) -> Human3D {
    let lhs = baseline.0;
    let rhs = baseline.1;
    let (a, b) = match (
        human.keypoints.get(lhs).copied().flatten(),
        human.keypoints.get(rhs).copied().flatten(),
    ) {
        (Some(a), Some(b)) => (a, b),
        _ => return human.clone(),
    };

    let va = Vector3::new(a.x, a.y, a.z);
    let vb = Vector3::new(b.x, b.y, b.z);
    let mid = (va + vb) * 0.5;
    let v = vb - va;
    if v.norm() == 0.0 {
        return human.clone();
    }

    // θ1: 水平面への射影を揃える垂直軸まわりの回転
    let theta1 = if v.x == 0.0 && v.z == 0.0 {
        0.0
    } else {
        (v.z / v.x).atan()
    };
    let yaw = Rotation3::from_axis_angle(&Vector3::y_axis(), theta1);

    // θ2: 残った傾きを揃える奥行き軸まわりの回転
    let v1 = yaw * v;
    let theta2 = if v1.x == 0.0 && v1.y == 0.0 {
        0.0
    } else {
        (v1.y / v1.x).atan()
    };
    let tilt = Rotation3::from_axis_angle(&Vector3::z_axis(), -theta2);

    let recenter = Vector3::new(0.5, mid.y, mid.z);
    let transform = |kp: Keypoint3D| {
        let p = Vector3::new(kp.x, kp.y, kp.z);
        let q = tilt * (yaw * (p - mid)) + recenter;
        Keypoint3D::new(q.x, q.y, q.z, kp.score)
    };

    let keypoints = human
        .keypoints
        .iter()
        .map(|kp| kp.map(transform))
        .collect();
    let lines = human
        .lines
        .iter()
        .map(|line| Line3D {
            edge: line.edge,
            from: transform(line.from),
            to: transform(line.to),
        })
        .collect();
    Human3D { keypoints, lines }
}

/// 2つの3D骨格のコサイン類似度（-1.0〜1.0）
///
/// トポロジーのエッジインデックスが一致するライン同士の (to - from) ベクトルの
/// コサイン類似度を平均する。長さゼロのベクトルは飛ばし、
/// 比較可能なペアが1つも無ければNone。
pub fn similarity(a: &Human3D, b: &Human3D) -> Option<f32> {
    let mut cosines: Vec<f32> = Vec::new();
    for line_a in &a.lines {
        let line_b = match b.lines.iter().find(|l| l.edge == line_a.edge) {
            Some(l) => l,
            None => continue,
        };
        let v1 = Vector3::new(
            line_a.to.x - line_a.from.x,
            line_a.to.y - line_a.from.y,
            line_a.to.z - line_a.from.z,
        );
        let v2 = Vector3::new(
            line_b.to.x - line_b.from.x,
            line_b.to.y - line_b.from.y,
            line_b.to.z - line_b.from.z,
        );
        let n1 = v1.norm();
        let n2 = v2.norm();
        if n1 == 0.0 || n2 == 0.0 {
            continue;
        }
        cosines.push((v1.dot(&v2) / (n1 * n2)).clamp(-1.0, 1.0));
    }

    if cosines.is_empty() {
        return None;
    }
    Some(cosines.iter().sum::<f32>() / cosines.len() as f32)
}

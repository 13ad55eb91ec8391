use crate::skeleton::Keypoint3D;
use crate::tensor::FlatTensor;

/// 数値安定版softmax（in-place）
///
/// 最大値を引いてからexpを取るので入力のシフトに不変。合計は1になる。
pub fn softmax(values: &mut [f32]) {
    if values.is_empty() {
        return;
    }
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

/// ボリュームヒートマップ1チャンネルのsoft-argmax
///
/// レイアウト [1, K, D, H, W]。チャンネル全体をコピーしてsoftmax正規化し、
/// 各軸の周辺分布の期待値からサブボクセル座標を求める。
/// スコアは期待値を丸めたボクセル周辺3x3x3の確率質量（中心は2倍重み）。
pub fn soft_argmax3d(tensor: &FlatTensor, channel: usize) -> Keypoint3D {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 5, "volumetric tensor must have rank 5, got {:?}", shape);
    let (depth, height, width) = (shape[2], shape[3], shape[4]);

    // 入力テンソルは変更しない（コピーしてから正規化する）
    let mut volume = tensor.volume_copy(channel);
    softmax(&mut volume);

    // 各軸の周辺分布
    let mut pz = vec![0.0f32; depth];
    let mut py = vec![0.0f32; height];
    let mut px = vec![0.0f32; width];
    for d in 0..depth {
        for h in 0..height {
            let base = (d * height + h) * width;
            for w in 0..width {
                let p = volume[base + w];
                pz[d] += p;
                py[h] += p;
                px[w] += p;
            }
        }
    }

    // 期待値 Σ p(i)·i
    let ex: f32 = px.iter().enumerate().map(|(i, p)| p * i as f32).sum();
    let ey: f32 = py.iter().enumerate().map(|(i, p)| p * i as f32).sum();
    let ez: f32 = pz.iter().enumerate().map(|(i, p)| p * i as f32).sum();

    let score = neighborhood_mass(&volume, depth, height, width, ez, ey, ex);

    Keypoint3D::new(
        (ex - 0.5) / width as f32,
        (ey - 0.5) / height as f32,
        (ez - 0.5) / depth as f32,
        score,
    )
}

/// 期待値を丸めたボクセル周辺3x3x3の確率質量を集計（中心セルは2倍重み）
fn neighborhood_mass(
    volume: &[f32],
    depth: usize,
    height: usize,
    width: usize,
    ez: f32,
    ey: f32,
    ex: f32,
) -> f32 {
    let cd = (ez.round() as i64).clamp(0, depth as i64 - 1);
    let ch = (ey.round() as i64).clamp(0, height as i64 - 1);
    let cw = (ex.round() as i64).clamp(0, width as i64 - 1);

    let mut mass = 0.0f32;
    for dd in -1..=1i64 {
        for dh in -1..=1i64 {
            for dw in -1..=1i64 {
                let (d, h, w) = (cd + dd, ch + dh, cw + dw);
                if d < 0 || h < 0 || w < 0 {
                    continue;
                }
                let (d, h, w) = (d as usize, h as usize, w as usize);
                if d >= depth || h >= height || w >= width {
                    continue;
                }
                let p = volume[(d * height + h) * width + w];
                if dd == 0 && dh == 0 && dw == 0 {
                    mass += p * 2.0;
                } else {
                    mass += p;
                }
            }
        }
    }
    mass.clamp(0.0, 1.0)
}

use crate::tensor::FlatTensor;

/// 1チャンネル分の2D argmax
///
/// レイアウト [1, H, W, C]。同値はスキャン順（row-major）で先のものが勝つ。
pub fn argmax2d(tensor: &FlatTensor, channel: usize) -> (usize, usize, f32) {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 4, "heatmap tensor must have rank 4, got {:?}", shape);
    let (height, width) = (shape[1], shape[2]);

    let mut max = (0, 0, tensor.heatmap(0, 0, 0, channel));
    for row in 0..height {
        for col in 0..width {
            let value = tensor.heatmap(0, row, col, channel);
            if value > max.2 {
                max = (row, col, value);
            }
        }
    }
    max
}

/// 1チャンネル分の3D argmax
///
/// レイアウト [1, K, D, H, W]。戻り値は (dep, row, col, val)。
pub fn argmax3d(tensor: &FlatTensor, channel: usize) -> (usize, usize, usize, f32) {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 5, "volumetric tensor must have rank 5, got {:?}", shape);
    let (depth, height, width) = (shape[2], shape[3], shape[4]);

    let mut max = (0, 0, 0, tensor.element(&[0, channel, 0, 0, 0]));
    for dep in 0..depth {
        for row in 0..height {
            for col in 0..width {
                let value = tensor.element(&[0, channel, dep, row, col]);
                if value > max.3 {
                    max = (dep, row, col, value);
                }
            }
        }
    }
    max
}

/// グリッドインデックスを正規化座標へ（セル中心）
pub fn normalized(index: usize, dim: usize) -> f32 {
    (index as f32 + 0.5) / dim as f32
}

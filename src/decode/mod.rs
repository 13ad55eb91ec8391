pub mod argmax;
pub mod nms;
pub mod paf;
pub mod soft_argmax;

pub use nms::Candidate;

use crate::config::DecodeOptions;
use crate::skeleton::{Human2D, Human3D, Keypoint2D, Keypoint3D};
use crate::tensor::FlatTensor;
use crate::topology::BodyPartTopology;

use argmax::{argmax2d, argmax3d, normalized};
use soft_argmax::soft_argmax3d;

/// argmaxによるシングルパーソンのデコード
///
/// ヒートマップ [1, H, W, C]（C >= 部位数）から1人分の骨格を返す。
pub fn decode_single(
    tensor: &FlatTensor,
    topology: &BodyPartTopology,
    part_threshold: Option<f32>,
) -> Human2D {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 4, "heatmap tensor must have rank 4, got {:?}", shape);
    assert!(
        shape[3] >= topology.part_count(),
        "tensor has {} channels but topology has {} parts",
        shape[3],
        topology.part_count()
    );
    let (height, width) = (shape[1], shape[2]);

    let keypoints: Vec<Option<Keypoint2D>> = (0..topology.part_count())
        .map(|part| {
            let (row, col, value) = argmax2d(tensor, part);
            let keypoint = Keypoint2D::new(normalized(col, width), normalized(row, height), value);
            match part_threshold {
                Some(threshold) if value <= threshold => None,
                _ => Some(keypoint),
            }
        })
        .collect();
    Human2D::from_keypoints(keypoints, topology)
}

/// ヒートマップ+オフセット枝のシングルパーソンデコード（PoseNet系）
///
/// 粗いグリッドのargmax位置を、同セルのオフセット値（入力ピクセル単位、
/// チャンネル前半がy・後半がx）で補正する。input_sizeはモデル入力の (幅, 高さ)。
pub fn decode_single_with_offsets(
    heatmaps: &FlatTensor,
    offsets: &FlatTensor,
    topology: &BodyPartTopology,
    input_size: (usize, usize),
    part_threshold: Option<f32>,
) -> Human2D {
    let shape = heatmaps.shape();
    assert_eq!(shape.len(), 4, "heatmap tensor must have rank 4, got {:?}", shape);
    let (height, width) = (shape[1], shape[2]);
    assert!(width > 1 && height > 1, "offset decoding needs a grid larger than 1x1");
    let part_count = topology.part_count();
    assert!(
        offsets.shape()[3] >= part_count * 2,
        "offset tensor has {} channels but topology needs {}",
        offsets.shape()[3],
        part_count * 2
    );
    let (input_width, input_height) = (input_size.0 as f32, input_size.1 as f32);

    let keypoints: Vec<Option<Keypoint2D>> = (0..part_count)
        .map(|part| {
            let (row, col, value) = argmax2d(heatmaps, part);
            let x_naive = col as f32 / (width - 1) as f32;
            let y_naive = row as f32 / (height - 1) as f32;
            let x_offset = offsets.heatmap(0, row, col, part + part_count);
            let y_offset = offsets.heatmap(0, row, col, part);
            let keypoint = Keypoint2D::new(
                x_naive + x_offset / input_width,
                y_naive + y_offset / input_height,
                value,
            );
            match part_threshold {
                Some(threshold) if value <= threshold => None,
                _ => Some(keypoint),
            }
        })
        .collect();
    Human2D::from_keypoints(keypoints, topology)
}

/// PAF組み立てによるマルチパーソンのデコード
pub fn decode_multi_all_parts(
    tensor: &FlatTensor,
    topology: &BodyPartTopology,
    options: &DecodeOptions,
) -> Vec<Human2D> {
    paf::assemble(tensor, topology, options)
}

/// 1部位のみのマルチパーソン候補（組み立てなし）
///
/// NMS候補1つにつき、その部位だけ埋めた骨格を返す。
pub fn decode_multi_single_part(
    tensor: &FlatTensor,
    topology: &BodyPartTopology,
    part: usize,
    window: usize,
    min_score: Option<f32>,
) -> Vec<Human2D> {
    assert!(
        part < topology.part_count(),
        "part index {} out of range ({} parts)",
        part,
        topology.part_count()
    );
    let shape = tensor.shape();
    let (height, width) = (shape[1], shape[2]);

    nms::nms(tensor, part, window, min_score)
        .into_iter()
        .map(|candidate| {
            let mut keypoints: Vec<Option<Keypoint2D>> = vec![None; topology.part_count()];
            keypoints[part] = Some(Keypoint2D::new(
                (candidate.col as f32 + 0.5) / width as f32,
                (candidate.row as f32 + 0.5) / height as f32,
                candidate.value,
            ));
            Human2D::from_keypoints(keypoints, topology)
        })
        .collect()
}

/// argmaxによる3Dデコード（ボリュームヒートマップ [1, K, D, H, W]）
pub fn decode_3d_argmax(tensor: &FlatTensor, topology: &BodyPartTopology) -> Human3D {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 5, "volumetric tensor must have rank 5, got {:?}", shape);
    assert!(
        shape[1] >= topology.part_count(),
        "tensor has {} channels but topology has {} parts",
        shape[1],
        topology.part_count()
    );
    let (depth, height, width) = (shape[2], shape[3], shape[4]);

    let keypoints: Vec<Option<Keypoint3D>> = (0..topology.part_count())
        .map(|part| {
            let (dep, row, col, value) = argmax3d(tensor, part);
            Some(Keypoint3D::new(
                normalized(col, width),
                normalized(row, height),
                normalized(dep, depth),
                value,
            ))
        })
        .collect();
    Human3D::from_keypoints(keypoints, topology)
}

/// soft-argmaxによる3Dデコード（サブボクセル精度）
pub fn decode_3d_soft_argmax(tensor: &FlatTensor, topology: &BodyPartTopology) -> Human3D {
    let shape = tensor.shape();
    assert_eq!(shape.len(), 5, "volumetric tensor must have rank 5, got {:?}", shape);
    assert!(
        shape[1] >= topology.part_count(),
        "tensor has {} channels but topology has {} parts",
        shape[1],
        topology.part_count()
    );

    let keypoints: Vec<Option<Keypoint3D>> = (0..topology.part_count())
        .map(|part| Some(soft_argmax3d(tensor, part)))
        .collect();
    Human3D::from_keypoints(keypoints, topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn chain_topology(parts: usize) -> Result<BodyPartTopology> {
        let names = (0..parts).map(|i| format!("part{}", i)).collect();
        let edges = (0..parts - 1).map(|i| (i, i + 1)).collect();
        BodyPartTopology::new(names, edges)
    }

    fn heatmap_tensor(height: usize, width: usize, peaks: &[(usize, usize, f32)]) -> FlatTensor {
        let channels = peaks.len();
        let mut data = vec![0.0; height * width * channels];
        for (channel, &(row, col, value)) in peaks.iter().enumerate() {
            data[(row * width + col) * channels + channel] = value;
        }
        FlatTensor::new(data, vec![1, height, width, channels])
    }

    #[test]
    fn test_decode_single() -> Result<()> {
        let topology = chain_topology(3)?;
        let tensor = heatmap_tensor(8, 8, &[(1, 1, 0.9), (3, 3, 0.8), (5, 5, 0.7)]);
        let human = decode_single(&tensor, &topology, None);

        assert_eq!(human.keypoints.len(), 3);
        let kp = human.keypoints[1].unwrap();
        assert!((kp.x - 3.5 / 8.0).abs() < 1e-6);
        assert!((kp.y - 3.5 / 8.0).abs() < 1e-6);
        assert_eq!(kp.score, 0.8);
        assert_eq!(human.lines.len(), 2);
        Ok(())
    }

    #[test]
    fn test_decode_single_coordinates_in_unit_range() -> Result<()> {
        let topology = chain_topology(2)?;
        // ピークが四隅でも正規化座標は(0,1)に収まる
        let tensor = heatmap_tensor(8, 8, &[(0, 0, 0.9), (7, 7, 0.8)]);
        let human = decode_single(&tensor, &topology, None);
        for kp in human.keypoints.iter().flatten() {
            assert!(kp.x > 0.0 && kp.x < 1.0);
            assert!(kp.y > 0.0 && kp.y < 1.0);
        }
        Ok(())
    }

    #[test]
    fn test_decode_single_threshold() -> Result<()> {
        let topology = chain_topology(3)?;
        let tensor = heatmap_tensor(8, 8, &[(1, 1, 0.9), (3, 3, 0.05), (5, 5, 0.7)]);
        let human = decode_single(&tensor, &topology, Some(0.1));

        assert!(human.keypoints[0].is_some());
        assert!(human.keypoints[1].is_none());
        assert!(human.keypoints[2].is_some());
        // 部位1を通るエッジが両方落ちる
        assert!(human.lines.is_empty());
        Ok(())
    }

    #[test]
    fn test_decode_single_with_offsets() -> Result<()> {
        let topology = chain_topology(1)?;
        let (h, w) = (9, 9);
        let input = (257usize, 257usize);

        let mut heatmap_data = vec![0.0; h * w];
        heatmap_data[4 * w + 6] = 0.9;
        let heatmaps = FlatTensor::new(heatmap_data, vec![1, h, w, 1]);

        // チャンネル0がyオフセット、チャンネル1がxオフセット
        let mut offset_data = vec![0.0; h * w * 2];
        offset_data[(4 * w + 6) * 2] = 10.0; // y +10px
        offset_data[(4 * w + 6) * 2 + 1] = -8.0; // x -8px
        let offsets = FlatTensor::new(offset_data, vec![1, h, w, 2]);

        let human = decode_single_with_offsets(&heatmaps, &offsets, &topology, input, None);
        let kp = human.keypoints[0].unwrap();
        let expected_x = 6.0 / 8.0 - 8.0 / 257.0;
        let expected_y = 4.0 / 8.0 + 10.0 / 257.0;
        assert!((kp.x - expected_x).abs() < 1e-6, "x={}", kp.x);
        assert!((kp.y - expected_y).abs() < 1e-6, "y={}", kp.y);
        Ok(())
    }

    #[test]
    fn test_decode_multi_single_part() -> Result<()> {
        let topology = chain_topology(3)?;
        let (h, w) = (20, 20);
        let mut data = vec![0.0; h * w * 3];
        // 部位1に2つの離れたピーク
        data[(3 * w + 3) * 3 + 1] = 0.9;
        data[(15 * w + 15) * 3 + 1] = 0.8;
        let tensor = FlatTensor::new(data, vec![1, h, w, 3]);

        let humans = decode_multi_single_part(&tensor, &topology, 1, 3, Some(0.1));
        assert_eq!(humans.len(), 2);
        for human in &humans {
            assert!(human.keypoints[0].is_none());
            assert!(human.keypoints[1].is_some());
            assert!(human.keypoints[2].is_none());
            assert!(human.lines.is_empty());
        }
        Ok(())
    }

    #[test]
    fn test_decode_3d_argmax() -> Result<()> {
        let topology = chain_topology(2)?;
        let (k, d, h, w) = (2, 4, 4, 4);
        let mut data = vec![0.0; k * d * h * w];
        data[((0 * d + 1) * h + 2) * w + 3] = 0.9; // ch0: dep1 row2 col3
        data[((1 * d + 3) * h + 0) * w + 1] = 0.8; // ch1: dep3 row0 col1
        let tensor = FlatTensor::new(data, vec![1, k, d, h, w]);

        let human = decode_3d_argmax(&tensor, &topology);
        let kp0 = human.keypoints[0].unwrap();
        assert!((kp0.x - 3.5 / 4.0).abs() < 1e-6);
        assert!((kp0.y - 2.5 / 4.0).abs() < 1e-6);
        assert!((kp0.z - 1.5 / 4.0).abs() < 1e-6);
        assert_eq!(kp0.score, 0.9);
        assert_eq!(human.lines.len(), 1);
        Ok(())
    }

    #[test]
    fn test_decode_3d_soft_argmax() -> Result<()> {
        let topology = chain_topology(2)?;
        let (k, d, h, w) = (2, 8, 8, 8);
        let mut data = vec![0.0; k * d * h * w];
        data[((0 * d + 4) * h + 4) * w + 4] = 50.0;
        data[((1 * d + 2) * h + 6) * w + 3] = 50.0;
        let tensor = FlatTensor::new(data, vec![1, k, d, h, w]);

        let human = decode_3d_soft_argmax(&tensor, &topology);
        let kp1 = human.keypoints[1].unwrap();
        assert!((kp1.x - (3.0 - 0.5) / 8.0).abs() < 1e-3);
        assert!((kp1.y - (6.0 - 0.5) / 8.0).abs() < 1e-3);
        assert!((kp1.z - (2.0 - 0.5) / 8.0).abs() < 1e-3);
        assert!(kp1.score > 0.9);
        Ok(())
    }

    #[test]
    fn test_decode_idempotent() -> Result<()> {
        let topology = chain_topology(3)?;
        let tensor = heatmap_tensor(8, 8, &[(1, 1, 0.9), (3, 3, 0.8), (5, 5, 0.7)]);
        let first = decode_single(&tensor, &topology, None);
        let second = decode_single(&tensor, &topology, None);
        assert_eq!(first.keypoints, second.keypoints);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "channels")]
    fn test_channel_mismatch_panics() {
        let topology = chain_topology(5).unwrap();
        let tensor = FlatTensor::new(vec![0.0; 8 * 8 * 3], vec![1, 8, 8, 3]);
        decode_single(&tensor, &topology, None);
    }
}

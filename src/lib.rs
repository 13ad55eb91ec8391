pub mod config;
pub mod decode;
pub mod normalize;
pub mod skeleton;
pub mod tensor;
pub mod topology;

pub use config::{Config, DecodeOptions};
pub use decode::{
    decode_3d_argmax, decode_3d_soft_argmax, decode_multi_all_parts, decode_multi_single_part,
    decode_single, decode_single_with_offsets,
};
pub use normalize::{normalize_baseline, similarity};
pub use skeleton::{Human2D, Human3D, Keypoint2D, Keypoint3D, Line2D, Line3D};
pub use tensor::FlatTensor;
pub use topology::BodyPartTopology;

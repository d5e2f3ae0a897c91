//! Wire-protocol and telemetry processing

pub mod codec;
pub mod sound_speed;

pub use codec::{CodecError, CodecResult, DeviceError, DeviceInfo, RemoteCommand, Sentence, SentenceCodec};
pub use sound_speed::SoundSpeedEstimator;

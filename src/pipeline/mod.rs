pub mod camera;
pub mod compositor;
pub mod frame_convert;
pub mod overlay;
pub mod recognizer;

pub use camera::{CameraDevice, CameraStream, available_cameras, start_camera_stream};
pub use compositor::{CompositedFrame, start_frame_compositor};
pub use recognizer::{RecognizerBackend, start_recognizer};

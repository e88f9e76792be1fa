use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use gpui::{
    App, AppContext, Context, Render, RenderImage, TitlebarOptions, Window, WindowOptions,
};
use gpui_component::Root;

use crate::{
    action::ChannelSink,
    model_download::{ModelDownloadEvent, ModelKind},
    pipeline::{
        CameraDevice, CameraStream, CompositedFrame, RecognizerBackend, start_frame_compositor,
        start_recognizer,
    },
    types::{Frame, GestureEvent, RecognizedFrame},
};

mod camera_view;
mod download;
mod main_view;
mod render_util;

const DEFAULT_CAMERA_RATIO: f32 = 4.0 / 3.0;
const CAMERA_VIEW_WIDTH: f32 = 640.0;

pub fn launch_ui(
    app: &mut App,
    display_tx: Sender<Frame>,
    display_rx: Receiver<Frame>,
    recognizer_tx: Sender<Frame>,
    recognizer_rx: Receiver<Frame>,
    backend: RecognizerBackend,
) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Gesture Scroll".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| {
            AppView::new(
                display_tx,
                display_rx,
                recognizer_tx,
                recognizer_rx,
                backend,
            )
        });
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    display_tx: Sender<Frame>,
    recognizer_tx: Sender<Frame>,
    recognizer_rx: Option<Receiver<Frame>>,
    recognized_tx: Option<Sender<RecognizedFrame>>,
    composited_rx: Receiver<CompositedFrame>,
    gesture_tx: Option<Sender<GestureEvent>>,
    gesture_rx: Receiver<GestureEvent>,
    backend: RecognizerBackend,
    recognizer_handle: Option<thread::JoinHandle<()>>,
    _compositor_handle: thread::JoinHandle<()>,
    camera_stream: Option<CameraStream>,
    available_cameras: Vec<CameraDevice>,
    selected_camera_idx: Option<usize>,
    camera_error: Option<String>,
    camera_picker_open: bool,
    latest_frame: Option<FrameStatus>,
    latest_gesture: Option<GestureEvent>,
    latest_image: Option<Arc<RenderImage>>,
    download_rx: Receiver<DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,
}

/// What the status line needs from the last displayed frame.
struct FrameStatus {
    width: u32,
    height: u32,
    hand_detected: bool,
    confidence: f32,
}

enum Screen {
    Camera(CameraState),
    Download(DownloadState),
    Main,
}

enum CameraState {
    Unavailable {
        message: String,
    },
    Selection {
        options: Vec<CameraDevice>,
        selected: usize,
        start_error: Option<String>,
    },
    Ready,
}

struct DownloadState {
    current: Option<ModelKind>,
    downloaded: u64,
    total: Option<u64>,
    ready: usize,
    message: String,
    error: Option<String>,
}

impl DownloadState {
    fn new() -> Self {
        Self {
            current: None,
            downloaded: 0,
            total: None,
            ready: 0,
            message: "Preparing hand tracking models...".to_string(),
            error: None,
        }
    }

    fn finished(&self) -> bool {
        self.error.is_none() && self.ready >= ModelKind::ALL.len()
    }
}

enum DownloadMessage {
    Event(ModelDownloadEvent),
    Error(String),
}

impl AppView {
    fn new(
        display_tx: Sender<Frame>,
        display_rx: Receiver<Frame>,
        recognizer_tx: Sender<Frame>,
        recognizer_rx: Receiver<Frame>,
        backend: RecognizerBackend,
    ) -> Self {
        let (recognized_tx, recognized_rx) = bounded(1);
        let (composited_tx, composited_rx) = bounded(1);
        let (gesture_tx, gesture_rx) = unbounded();
        let compositor_handle = start_frame_compositor(display_rx, recognized_rx, composited_tx);

        let (download_tx, download_rx) = unbounded();
        let download_handle = download::spawn_model_download(backend.clone(), download_tx);

        let (initial_camera_state, available_cameras) = Self::initial_camera_state();
        let selected_camera_idx = if available_cameras.is_empty() {
            None
        } else {
            Some(0)
        };

        Self {
            screen: Screen::Camera(initial_camera_state),
            display_tx,
            recognizer_tx,
            recognizer_rx: Some(recognizer_rx),
            recognized_tx: Some(recognized_tx),
            composited_rx,
            gesture_tx: Some(gesture_tx),
            gesture_rx,
            backend,
            recognizer_handle: None,
            _compositor_handle: compositor_handle,
            camera_stream: None,
            available_cameras,
            selected_camera_idx,
            camera_error: None,
            camera_picker_open: false,
            latest_frame: None,
            latest_gesture: None,
            latest_image: None,
            download_rx,
            _download_handle: download_handle,
        }
    }

    fn start_recognizer_if_needed(&mut self) {
        if self.recognizer_handle.is_some() {
            return;
        }

        let (Some(frame_rx), Some(result_tx), Some(gesture_tx)) = (
            self.recognizer_rx.take(),
            self.recognized_tx.take(),
            self.gesture_tx.take(),
        ) else {
            log::warn!("recognizer channels already consumed");
            return;
        };

        let handle = start_recognizer(
            self.backend.clone(),
            frame_rx,
            result_tx,
            ChannelSink::new(gesture_tx),
        );
        self.recognizer_handle = Some(handle);
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        // Keep repainting so new camera frames show up without input events.
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let mut screen = mem::replace(&mut self.screen, Screen::Main);
        let view = match screen {
            Screen::Camera(mut state) => {
                let view = self.render_camera_view(&mut state, cx);
                screen = match state {
                    CameraState::Ready => Screen::Download(DownloadState::new()),
                    other => Screen::Camera(other),
                };
                view
            }
            Screen::Download(mut state) => {
                self.poll_download_events(&mut state);
                let view = self.render_download_view(&state, cx);
                if state.finished() {
                    self.start_recognizer_if_needed();
                    screen = Screen::Main;
                } else {
                    screen = Screen::Download(state);
                }
                view
            }
            Screen::Main => {
                screen = Screen::Main;
                self.render_main(window, cx)
            }
        };
        self.screen = screen;
        view
    }
}

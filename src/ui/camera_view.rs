use gpui::{
    AnyElement, Context, InteractiveElement, IntoElement, MouseButton, ParentElement, SharedString,
    Styled, div, prelude::FluentBuilder, px,
};
use gpui_component::{
    ActiveTheme, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use super::{AppView, CameraState, DownloadState, Screen};
use crate::pipeline::{self, CameraDevice};

impl AppView {
    pub(super) fn initial_camera_state() -> (CameraState, Vec<CameraDevice>) {
        match pipeline::available_cameras() {
            Ok(cameras) if cameras.is_empty() => (
                CameraState::Unavailable {
                    message: "No camera was found on this machine.".to_string(),
                },
                Vec::new(),
            ),
            Ok(cameras) => (
                CameraState::Selection {
                    options: cameras.clone(),
                    selected: 0,
                    start_error: None,
                },
                cameras,
            ),
            Err(err) => {
                log::error!("error accessing the camera: {err:?}");
                (
                    CameraState::Unavailable {
                        message: format!("Could not list cameras: {err:#}"),
                    },
                    Vec::new(),
                )
            }
        }
    }

    pub(super) fn render_camera_view(
        &mut self,
        state: &mut CameraState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        match state {
            CameraState::Unavailable { message } => v_flex()
                .gap_2()
                .p_4()
                .rounded_lg()
                .border_1()
                .border_color(theme.border)
                .bg(theme.group_box)
                .child(
                    div()
                        .text_sm()
                        .text_color(theme.accent)
                        .font_semibold()
                        .child("⚠ No camera available"),
                )
                .child(
                    div()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child("Check that a camera is connected and camera access is allowed."),
                )
                .child(div().text_color(theme.foreground).child(message.clone()))
                .into_any_element(),
            CameraState::Selection {
                options,
                selected,
                start_error,
            } => {
                // A single camera needs no picker.
                if options.len() == 1 && self.camera_stream.is_none() && start_error.is_none() {
                    match self.start_camera_for_device(&options[0]) {
                        Ok(()) => {
                            *state = CameraState::Ready;
                            return div().child("Starting camera...").into_any_element();
                        }
                        Err(err) => *start_error = Some(err),
                    }
                }

                let mut picker = picker_shell().child(picker_title());
                for (idx, device) in options.iter().enumerate() {
                    let row = camera_row(device, *selected == idx).on_mouse_down(
                        MouseButton::Left,
                        cx.listener(move |this, _, _, cx| {
                            this.select_camera(idx);
                            cx.notify();
                        }),
                    );
                    picker = picker.child(row);
                }
                if let Some(err) = start_error.as_deref() {
                    picker = picker.child(error_banner(err));
                }
                picker = picker.child(
                    Button::new(SharedString::from("camera-confirm"))
                        .primary()
                        .label("✓ Use selected camera")
                        .w_full()
                        .mt_2()
                        .on_click(cx.listener(|this, _, _, cx| {
                            this.start_selected_camera();
                            cx.notify();
                        })),
                );

                div()
                    .size_full()
                    .flex()
                    .items_center()
                    .justify_center()
                    .bg(gpui::rgba(0x1a233288))
                    .child(div().w(px(450.0)).child(picker))
                    .into_any_element()
            }
            CameraState::Ready => div()
                .p_4()
                .text_sm()
                .text_color(theme.foreground)
                .child("⟳ Starting camera...")
                .into_any_element(),
        }
    }

    /// Picker shown over the video once the app is running.
    pub(super) fn render_camera_picker_main(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let title_row = h_flex()
            .justify_between()
            .items_center()
            .w_full()
            .child(picker_title())
            .child(
                Button::new(SharedString::from("camera-picker-close"))
                    .label("×")
                    .ghost()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.camera_picker_open = false;
                        cx.notify();
                    })),
            );

        let mut picker = picker_shell().child(title_row);
        for (idx, device) in self.available_cameras.iter().enumerate() {
            let row = camera_row(device, self.selected_camera_idx == Some(idx)).on_mouse_down(
                MouseButton::Left,
                cx.listener(move |this, _, _, cx| {
                    this.switch_camera(idx);
                    cx.notify();
                }),
            );
            picker = picker.child(row);
        }
        if let Some(err) = &self.camera_error {
            picker = picker.child(error_banner(err));
        }
        picker.into_any_element()
    }

    pub(super) fn switch_camera(&mut self, idx: usize) {
        let Some(device) = self.available_cameras.get(idx).cloned() else {
            self.camera_error = Some("The selected camera is gone.".to_string());
            return;
        };

        match self.start_camera_for_device(&device) {
            Ok(()) => {
                self.selected_camera_idx = Some(idx);
                self.camera_picker_open = false;
            }
            Err(err) => self.camera_error = Some(err),
        }
    }

    fn select_camera(&mut self, selected: usize) {
        if let Screen::Camera(CameraState::Selection {
            options,
            selected: current,
            start_error,
        }) = &mut self.screen
        {
            if selected < options.len() {
                *current = selected;
                *start_error = None;
                self.selected_camera_idx = Some(selected);
            }
        }
    }

    fn start_camera_for_device(&mut self, device: &CameraDevice) -> Result<(), String> {
        // Dropping the old stream joins its capture thread before the device is reopened.
        self.camera_stream = None;

        match pipeline::start_camera_stream(
            device.index.clone(),
            self.display_tx.clone(),
            self.recognizer_tx.clone(),
        ) {
            Ok(stream) => {
                log::info!("camera started: {}", device.label);
                self.camera_stream = Some(stream);
                self.latest_frame = None;
                self.camera_error = None;
                Ok(())
            }
            Err(err) => {
                log::error!("error accessing the camera: {err:?}");
                Err(format!("Could not start camera: {err:#}"))
            }
        }
    }

    fn start_selected_camera(&mut self) {
        let selected = match &self.screen {
            Screen::Camera(CameraState::Selection {
                options, selected, ..
            }) => options.get(*selected).cloned().map(|device| (*selected, device)),
            _ => None,
        };

        let result = match selected {
            Some((idx, device)) => self
                .start_camera_for_device(&device)
                .map(|()| self.selected_camera_idx = Some(idx)),
            None => Err("The selected camera is gone.".to_string()),
        };

        match result {
            Ok(()) => self.screen = Screen::Download(DownloadState::new()),
            Err(err) => {
                if let Screen::Camera(CameraState::Selection { start_error, .. }) = &mut self.screen
                {
                    *start_error = Some(err);
                }
            }
        }
    }
}

fn picker_shell() -> gpui::Div {
    v_flex()
        .gap_2()
        .p_4()
        .rounded_xl()
        .bg(gpui::rgba(0x0f1419f5))
        .border_1()
        .border_color(gpui::rgba(0x2d3748ff))
        .shadow_lg()
}

fn picker_title() -> gpui::Div {
    h_flex()
        .gap_2()
        .items_center()
        .child(div().text_base().text_color(gpui::rgb(0xa5b4fc)).child("◉"))
        .child(
            div()
                .text_sm()
                .font_semibold()
                .text_color(gpui::rgb(0xe2e8f0))
                .child("Choose a camera"),
        )
}

fn camera_row(device: &CameraDevice, is_selected: bool) -> gpui::Div {
    h_flex()
        .w_full()
        .gap_3()
        .items_center()
        .p_3()
        .rounded_lg()
        .cursor_pointer()
        .bg(if is_selected {
            gpui::rgba(0x2d374855)
        } else {
            gpui::rgba(0x1e293b00)
        })
        .border_1()
        .border_color(if is_selected {
            gpui::rgba(0x64748bff)
        } else {
            gpui::rgba(0x33415500)
        })
        .child(
            div()
                .flex_1()
                .text_sm()
                .text_color(if is_selected {
                    gpui::rgb(0xe2e8f0)
                } else {
                    gpui::rgb(0xcbd5e1)
                })
                .overflow_hidden()
                .text_ellipsis()
                .whitespace_nowrap()
                .child(device.label.clone()),
        )
        .when(is_selected, |this| {
            this.child(
                div()
                    .text_sm()
                    .flex_shrink_0()
                    .text_color(gpui::rgb(0xa5b4fc))
                    .child("✓"),
            )
        })
}

fn error_banner(message: &str) -> gpui::Div {
    h_flex()
        .gap_2()
        .items_start()
        .mt_2()
        .p_3()
        .rounded_lg()
        .bg(gpui::rgba(0x7f1d1d33))
        .border_1()
        .border_color(gpui::rgba(0xef4444aa))
        .child(div().text_sm().text_color(gpui::rgb(0xfca5a5)).child("!"))
        .child(
            div()
                .flex_1()
                .text_xs()
                .text_color(gpui::rgb(0xfca5a5))
                .child(message.to_string()),
        )
}

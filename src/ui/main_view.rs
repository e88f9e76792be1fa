use std::sync::Arc;

use gpui::{
    AnyElement, Context, IntoElement, ObjectFit, ParentElement, RenderImage, SharedString, Styled,
    StyledImage, Window, div, img, px,
};
use gpui_component::{
    ActiveTheme, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use super::{AppView, CAMERA_VIEW_WIDTH, DEFAULT_CAMERA_RATIO, FrameStatus};
use super::render_util::composited_to_image;

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        self.poll_pipeline(window, cx);

        let camera_label = self
            .selected_camera_idx
            .and_then(|idx| self.available_cameras.get(idx))
            .map(|c| c.label.clone())
            .unwrap_or_else(|| "no camera selected".to_string());

        let frame_status = match &self.latest_frame {
            Some(f) => format!("Camera: {camera_label} {}x{}", f.width, f.height),
            None => format!("Camera: {camera_label}, waiting for frames..."),
        };

        let hand_status = match &self.latest_frame {
            Some(f) if f.hand_detected => {
                format!("Hand detected ({:.0}%)", f.confidence * 100.0)
            }
            Some(_) => "No hand".to_string(),
            None => "--".to_string(),
        };

        let gesture_text = self
            .latest_gesture
            .as_ref()
            .map(|g| {
                format!(
                    "{}  ({:.1}s ago)",
                    g.display_text(),
                    g.timestamp.elapsed().as_secs_f32()
                )
            })
            .unwrap_or_else(|| "Gesture: --".to_string());

        let camera_width = CAMERA_VIEW_WIDTH;
        let camera_height = camera_width / self.camera_aspect_ratio();

        let frame_view: AnyElement = match &self.latest_image {
            Some(image) => img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element(),
            None => div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Waiting for camera...")
                .into_any_element(),
        };

        let mut camera_shell = div()
            .relative()
            .w(px(camera_width))
            .h(px(camera_height))
            .overflow_hidden()
            .rounded_t_lg()
            .bg(gpui::rgb(0x000000))
            .child(frame_view);

        if self.camera_picker_open && !self.available_cameras.is_empty() {
            camera_shell = camera_shell.child(
                div()
                    .absolute()
                    .top(px(16.0))
                    .left(px(camera_width * 0.15 / 2.0))
                    .w(px(camera_width * 0.85))
                    .child(self.render_camera_picker_main(cx)),
            );
        }

        let mut info_row = h_flex().justify_between().items_center().gap_2().child(
            div()
                .text_xs()
                .text_color(gpui::rgb(0xa0aab8))
                .child(hand_status),
        );
        if self.available_cameras.len() > 1 {
            let picker_label = if self.camera_picker_open {
                "◉ Close"
            } else {
                "◉ Switch camera"
            };
            info_row = info_row.child(
                Button::new(SharedString::from("camera-picker-toggle"))
                    .outline()
                    .label(picker_label)
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.camera_picker_open = !this.camera_picker_open;
                        cx.notify();
                    })),
            );
        }

        let theme = cx.theme();
        let mut details = v_flex().gap_2().p_3().child(info_row).child(
            div()
                .text_xs()
                .text_color(gpui::rgb(0x8b95a5))
                .overflow_hidden()
                .text_ellipsis()
                .whitespace_nowrap()
                .child(frame_status),
        );
        if let Some(err) = &self.camera_error {
            details = details.child(
                div()
                    .text_xs()
                    .text_color(gpui::rgb(0xfca5a5))
                    .child(err.clone()),
            );
        }

        let camera_card = v_flex()
            .w(px(camera_width))
            .rounded_lg()
            .overflow_hidden()
            .bg(gpui::rgb(0x0f1419))
            .child(camera_shell)
            .child(details);

        let gesture_card = div()
            .w(px(camera_width))
            .p_4()
            .rounded_lg()
            .bg(gpui::rgb(0x0f1419))
            .text_xl()
            .font_semibold()
            .text_color(if self.latest_gesture.is_some() {
                theme.foreground
            } else {
                theme.muted_foreground
            })
            .child(gesture_text);

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .gap_3()
            .p_4()
            .bg(gpui::rgb(0x1a2332))
            .child(camera_card)
            .child(gesture_card)
            .into_any_element()
    }

    /// Drains the compositor and gesture channels, keeping only the newest of each.
    fn poll_pipeline(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        while let Ok(event) = self.gesture_rx.try_recv() {
            self.latest_gesture = Some(event);
        }

        let Some(frame) = self.composited_rx.try_iter().last() else {
            return;
        };
        if let Some(image) = composited_to_image(&frame) {
            self.replace_latest_image(image, window, cx);
        }
        self.latest_frame = Some(FrameStatus {
            width: frame.width,
            height: frame.height,
            hand_detected: frame.hand_detected,
            confidence: frame.confidence,
        });
    }

    fn camera_aspect_ratio(&self) -> f32 {
        match &self.latest_frame {
            Some(frame) if frame.height > 0 => frame.width as f32 / frame.height as f32,
            _ => DEFAULT_CAMERA_RATIO,
        }
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every frame unless the old texture is dropped.
            cx.drop_image(old_image, Some(window));
        }
    }
}

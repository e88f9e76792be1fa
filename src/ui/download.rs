use std::thread;

use crossbeam_channel::Sender;
use gpui::{AnyElement, Context, IntoElement, ParentElement, Styled, div};
use gpui_component::{ActiveTheme, StyledExt, h_flex, tag::Tag, v_flex};

use super::{AppView, DownloadMessage, DownloadState};
use crate::{
    model_download::{ModelDownloadEvent, ModelKind, ensure_model_ready},
    pipeline::RecognizerBackend,
};

impl AppView {
    pub(super) fn poll_download_events(&mut self, state: &mut DownloadState) {
        while let Ok(msg) = self.download_rx.try_recv() {
            match msg {
                DownloadMessage::Event(ModelDownloadEvent::AlreadyPresent { model }) => {
                    state.message = format!("{} model already present", model.label());
                }
                DownloadMessage::Event(ModelDownloadEvent::Started { model, total }) => {
                    state.current = Some(model);
                    state.downloaded = 0;
                    state.total = total;
                    state.message = format!("Downloading {} model...", model.label());
                }
                DownloadMessage::Event(ModelDownloadEvent::Progress {
                    model,
                    downloaded,
                    total,
                }) => {
                    state.current = Some(model);
                    state.downloaded = downloaded;
                    state.total = total;
                }
                DownloadMessage::Event(ModelDownloadEvent::Finished { model }) => {
                    state.ready += 1;
                    state.message = format!("{} model ready", model.label());
                }
                DownloadMessage::Error(err) => {
                    state.error = Some(err);
                    state.message = "Model download failed".to_string();
                }
            }
        }
    }

    pub(super) fn render_download_view(
        &self,
        state: &DownloadState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let bar = progress_bar_string(state.downloaded, state.total);
        let detail = match state.current {
            Some(model) => format!(
                "{} ({}/{} ready)",
                model.file_name(),
                state.ready,
                ModelKind::ALL.len()
            ),
            None => format!("{}/{} ready", state.ready, ModelKind::ALL.len()),
        };

        let (status_icon, status_text, status_color) = if state.finished() {
            ("✓", "Models ready", theme.success)
        } else if state.error.is_some() {
            ("✗", "Download failed", theme.accent)
        } else {
            ("⟳", "Downloading", theme.foreground)
        };

        let mut container = v_flex()
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        div()
                            .text_color(status_color)
                            .font_semibold()
                            .child(format!("{status_icon} {status_text}")),
                    )
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.muted_foreground)
                            .child("Hand tracking models"),
                    ),
            )
            .child(
                div()
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_color(theme.foreground)
                    .child(bar),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(detail),
            )
            .child(
                div()
                    .text_color(theme.foreground)
                    .child(state.message.clone()),
            );

        if let Some(err) = &state.error {
            container = container.child(Tag::danger().rounded_full().child(format!("Error: {err}")));
        }

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(container)
            .into_any_element()
    }
}

/// Fetches every model the recognizer needs, one after the other. The first
/// failure is reported and stops the sequence.
pub(super) fn spawn_model_download(
    backend: RecognizerBackend,
    tx: Sender<DownloadMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for kind in ModelKind::ALL {
            let path = backend.model_path(kind);
            let result = ensure_model_ready(kind, &path, |event| {
                let _ = tx.send(DownloadMessage::Event(event));
            });

            if let Err(err) = result {
                log::error!("failed to download {} model: {err:?}", kind.label());
                let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
                return;
            }
        }
    })
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                pct * 100.0
            )
        }
        _ => format!("[{} KB] unknown size", downloaded / 1024),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(
            progress_bar_string(50, Some(100)),
            format!("[{}{}]  50.0%", "=".repeat(15), " ".repeat(15))
        );
        assert_eq!(
            progress_bar_string(200, Some(100)),
            format!("[{}] 100.0%", "=".repeat(30))
        );
    }

    #[test]
    fn unknown_size_reports_kilobytes() {
        assert_eq!(progress_bar_string(4096, None), "[4 KB] unknown size");
    }
}

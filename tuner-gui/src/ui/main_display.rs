//! # Main Display Module
//!
//! Layout of the tuner window: mode selector, note name, frequency,
//! cent meter and guidance line.

use iced::widget::{Space, column, container, pick_list, text};
use iced::{Alignment, Color, Element, Font, Length, font};
use tuner_core::TuningMode;
use tuner_core::tuning::{AUTO, string_names};

use super::cent_meter::{self, CentMeter};

const NOTE_FONT: Font = Font {
    weight: font::Weight::Bold,
    ..Font::DEFAULT
};

/// "Auto" followed by the six strings in canonical order.
fn mode_options() -> Vec<TuningMode> {
    std::iter::once(AUTO)
        .chain(string_names())
        .filter_map(TuningMode::from_selection)
        .collect()
}

/// Creates the complete main application view
pub fn create_main_view(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    if data.shutting_down {
        return container(text("Shutting down...").size(40))
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into();
    }

    let mode_picker = pick_list(
        mode_options(),
        Some(data.tuning_mode),
        crate::Message::TargetSelected,
    )
    .placeholder("Mode")
    .width(Length::Fixed(150.0));

    let active = data
        .last_reading
        .as_ref()
        .and_then(|reading| reading.evaluation().map(|eval| (reading, eval)));

    let (note, freq, cents, guide, guide_color) = match active {
        Some((reading, eval)) => (
            reading.note_name.clone(),
            format!("{:.1} Hz", reading.frequency),
            Some(eval.cents),
            eval.state.guidance().to_string(),
            cent_meter::state_color(eval.state),
        ),
        None => (
            "--".to_string(),
            if data.last_reading.is_some() { "Silence" } else { "0.0 Hz" }.to_string(),
            None,
            "Pluck a string".to_string(),
            Color::WHITE,
        ),
    };

    let mut layout = column![
        mode_picker,
        Space::with_height(20),
        text(note).size(80).font(NOTE_FONT),
        text(freq).size(20).color(Color::from_rgb8(0x9E, 0x9E, 0x9E)),
        Space::with_height(20),
        CentMeter::new(cents).view(),
        Space::with_height(10),
        text(guide).size(18).color(guide_color),
    ]
    .align_x(Alignment::Center);

    if let Some(error) = &data.audio_error {
        layout = layout.push(Space::with_height(20)).push(
            text(format!("Audio unavailable: {error}"))
                .size(14)
                .color(cent_meter::RED),
        );
    }

    container(layout)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_options_list_auto_then_strings() {
        let labels: Vec<_> = mode_options().iter().map(TuningMode::label).collect();
        assert_eq!(labels, ["Auto", "E2", "A2", "D3", "G3", "B3", "E4"]);
    }
}

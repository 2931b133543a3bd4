//! # Cent Meter Widget
//!
//! A horizontal meter showing how far the current string is from its target.
//! The needle position comes from the core's display mapping (-50..+50 cents
//! across the full width) and its color from the tuning state.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};
use tuner_core::evaluation::{METER_RANGE, PERFECT_TOLERANCE, display_position};
use tuner_core::TuningState;

pub const GREEN: Color = Color {
    r: 0.30,
    g: 0.69,
    b: 0.31,
    a: 1.0,
};
pub const ORANGE: Color = Color {
    r: 1.0,
    g: 0.60,
    b: 0.0,
    a: 1.0,
};
pub const RED: Color = Color {
    r: 0.96,
    g: 0.26,
    b: 0.21,
    a: 1.0,
};
pub const IDLE: Color = Color {
    r: 0.13,
    g: 0.59,
    b: 0.95,
    a: 1.0,
};

/// Color used for a tuning state across the UI.
pub fn state_color(state: TuningState) -> Color {
    match state {
        TuningState::Perfect => GREEN,
        TuningState::Flat => ORANGE,
        TuningState::Sharp => RED,
    }
}

/// Cent meter widget.
pub struct CentMeter {
    /// Current cent deviation (None while silent)
    cents: Option<f32>,
}

impl CentMeter {
    pub fn new(cents: Option<f32>) -> Self {
        Self { cents }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fixed(300.0))
                .height(iced::Length::Fixed(24.0)),
        )
        .into()
    }
}

impl<Message> canvas::Program<Message> for CentMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgb8(0x42, 0x42, 0x42));

        // In-tune band around the center.
        let band_half_width = PERFECT_TOLERANCE / (2.0 * METER_RANGE) * bounds.width;
        let center_x = bounds.width / 2.0;
        let band = Path::rectangle(
            Point::new(center_x - band_half_width, 0.0),
            Size::new(2.0 * band_half_width, bounds.height),
        );
        frame.fill(&band, Color { a: 0.25, ..GREEN });

        let center_line = Path::line(
            Point::new(center_x, 0.0),
            Point::new(center_x, bounds.height),
        );
        frame.stroke(
            &center_line,
            Stroke::default().with_width(1.0).with_color(Color::WHITE),
        );

        let (position, color) = match self.cents {
            Some(c) => (display_position(c), state_color(TuningState::from_cents(c))),
            None => (0.5, IDLE),
        };
        let needle_x = position * bounds.width;
        let needle = Path::rectangle(
            Point::new((needle_x - 2.0).clamp(0.0, bounds.width - 4.0), 0.0),
            Size::new(4.0, bounds.height),
        );
        frame.fill(&needle, color);

        vec![frame.into_geometry()]
    }
}

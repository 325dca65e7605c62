use iced::widget::container;
use iced::{Theme, Color, Background, Border};

pub fn hex_color(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 { return Color::BLACK; }
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    Color::from_rgb8(r, g, b)
}

pub struct WindowStyle;
impl container::StyleSheet for WindowStyle {
    type Style = Theme;
    fn appearance(&self, _: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Background::Color(hex_color("#181825"))),
            text_color: Some(hex_color("#cdd6f4")),
            ..Default::default()
        }
    }
}

pub struct LoginCardStyle;
impl container::StyleSheet for LoginCardStyle {
    type Style = Theme;
    fn appearance(&self, _: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Background::Color(hex_color("#292c3c"))),
            border: Border { color: hex_color("#414559"), width: 1.0, radius: 6.0.into() },
            ..Default::default()
        }
    }
}

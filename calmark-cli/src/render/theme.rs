use termimad::{
    Alignment, MadSkin,
    crossterm::style::{Attribute, Color},
};

/// Muted skin: past events fade out, upcoming ones stand out.
pub struct Agenda;

impl Agenda {
    pub fn skin() -> MadSkin {
        let mut skin = MadSkin::default();

        skin.paragraph.set_fg(Agenda::FG);
        skin.italic.set_fg(Agenda::PAST);
        skin.bold.set_fg(Agenda::FUTURE);
        skin.bold.add_attr(Attribute::Bold);

        skin.headers[0].set_fg(Agenda::HEADER);
        skin.headers[0].add_attr(Attribute::Bold);
        skin.headers[0].align = Alignment::Left;

        skin.table.set_fg(Agenda::GRID);
        skin.table.align = Alignment::Left;
        skin.inline_code.set_fg(Agenda::DURATION);
        skin.inline_code.set_bg(Agenda::BG);

        skin
    }

    pub const BG: Color = Color::Rgb {
        r: 0x28,
        g: 0x2C,
        b: 0x34,
    }; // #282C34
    pub const FG: Color = Color::Rgb {
        r: 0xAB,
        g: 0xB2,
        b: 0xBF,
    }; // #ABB2BF
    pub const HEADER: Color = Color::Rgb {
        r: 0x61,
        g: 0xAF,
        b: 0xEF,
    }; // #61AFEF
    pub const GRID: Color = Color::Rgb {
        r: 0x4B,
        g: 0x52,
        b: 0x63,
    }; // #4B5263
    pub const DURATION: Color = Color::Rgb {
        r: 0xE5,
        g: 0xC0,
        b: 0x7B,
    }; // #E5C07B
    pub const FUTURE: Color = Color::Rgb {
        r: 0x98,
        g: 0xC3,
        b: 0x79,
    }; // #98C379
    pub const PAST: Color = Color::Rgb {
        r: 0x5C,
        g: 0x63,
        b: 0x70,
    }; // #5C6370
}

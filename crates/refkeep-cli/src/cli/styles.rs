use console::Style;
use once_cell::sync::Lazy;

pub static INFO: Lazy<Style> = Lazy::new(|| Style::new().dim());
pub static SUCCESS: Lazy<Style> = Lazy::new(|| Style::new().green());
pub static WARNING: Lazy<Style> = Lazy::new(|| Style::new().yellow());
pub static ERROR: Lazy<Style> = Lazy::new(|| Style::new().red().bold());

pub static AUTHOR: Lazy<Style> = Lazy::new(|| Style::new().cyan().bold());
pub static TIME: Lazy<Style> = Lazy::new(|| Style::new().color256(246).italic());
pub static PATH: Lazy<Style> = Lazy::new(|| Style::new().yellow());
pub static HEADING: Lazy<Style> = Lazy::new(|| Style::new().bold().underlined());

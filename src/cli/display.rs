use ansi_term::Colour;

use crate::{
    tracker::state::ViewState,
    utils::{percentage::duration_percentage, time::format_duration},
};

/// One line summary, e.g. `home, break  3:25/7:30 (46%)  overtime 1:10`.
pub fn format_view(view: &ViewState) -> String {
    let mut flags = view.mode.to_string();
    if view.is_break {
        flags.push_str(", break");
    }
    if view.afk {
        flags.push_str(", AFK");
    }
    format!(
        "{flags}  {}/{} ({})  overtime {}",
        format_duration(view.done),
        format_duration(view.todo),
        duration_percentage(view.done, view.todo),
        format_duration(view.overtime),
    )
}

/// [format_view] coloured for a terminal. Green once the quota is met, yellow while time is not
/// counted.
pub fn paint_view(view: &ViewState) -> String {
    let line = format_view(view);
    if view.is_break || view.afk {
        Colour::Yellow.paint(line).to_string()
    } else if view.done >= view.todo {
        Colour::Green.paint(line).to_string()
    } else {
        line
    }
}

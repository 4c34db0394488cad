use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};

use crate::tui::component::Component;
use crate::tui::components::{Sidebar, TitleBar, TranscriptView};
use crate::tui::{Focus, TuiState};

/// Narrowest terminal that still gets a sidebar while the input has focus.
const SIDEBAR_MIN_TERMINAL_WIDTH: u16 = 70;

fn sidebar_width(total: u16) -> u16 {
    (total / 4).clamp(22, 36)
}

/// Splits the frame into `(sidebar, title, transcript, input)`. The sidebar
/// collapses on narrow terminals unless it has focus.
pub fn layout(area: Rect, input_height: u16, show_sidebar: bool) -> (Option<Rect>, Rect, Rect, Rect) {
    use Constraint::{Length, Min};

    let (sidebar, main) = if show_sidebar {
        let [side, main] = Layout::horizontal([Length(sidebar_width(area.width)), Min(0)]).areas(area);
        (Some(side), main)
    } else {
        (None, area)
    };
    let [title, transcript, input] =
        Layout::vertical([Length(1), Min(0), Length(input_height)]).areas(main);
    (sidebar, title, transcript, input)
}

pub fn draw_ui(frame: &mut Frame, tui: &mut TuiState, spinner_frame: usize) {
    let area = frame.area();
    let show_sidebar = tui.focus == Focus::Sidebar || area.width >= SIDEBAR_MIN_TERMINAL_WIDTH;
    let main_width = if show_sidebar {
        area.width.saturating_sub(sidebar_width(area.width))
    } else {
        area.width
    };
    let input_height = tui.input_box.calculate_height(main_width);
    let (sidebar_area, title_area, transcript_area, input_area) =
        layout(area, input_height, show_sidebar);

    TitleBar {
        display_name: &tui.display_name,
        conversation: tui.active_title(),
        status: tui.status.as_deref(),
        busy: tui.busy,
        spinner_frame,
    }
    .render(frame, title_area);

    TranscriptView::new(&mut tui.transcript).render(frame, transcript_area);

    if let Some(sidebar_area) = sidebar_area {
        Sidebar::new(&mut tui.sidebar, tui.focus == Focus::Sidebar, tui.language)
            .render(frame, sidebar_area);
    }

    // Drawn last so the cursor it places wins
    tui.input_box.render(frame, input_area);
}

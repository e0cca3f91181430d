use std::collections::HashSet;
use std::time::Instant;
use winit::keyboard::NamedKey;
use winit::window::{Fullscreen, Window};

use crate::cli::HELP_KEYS;
use crate::pages::{Direction, PageBuffer};
use crate::settings::Settings;
use crate::ui::render::{
    blit_scaled, draw_text, fill_rect, fit_scale, fit_width_scale, rgb, BG_COLOR,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ZOOM_STEP: f32 = 0.25;
const MIN_ZOOM: f32 = 0.05;
const STRIP_SCROLL_STEP: f32 = 60.0;
const PAGE_GAP: u32 = 8; // between the two pages in double-page mode

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

pub struct ViewerState {
    pub buffer: PageBuffer,
    pub settings: Settings,
    /// Transient user-facing message (open failures, empty folders).
    pub status_message: Option<String>,

    pub zoom: f32, // 0.0 = fit to window
    pub offset_x: f32,
    pub offset_y: f32,
    /// Vertical scroll position in long-strip mode, in framebuffer pixels.
    pub strip_scroll: f32,

    pub show_info: bool,
    pub show_help: bool,
    pub is_fullscreen: bool,

    pub dragging: bool,
    pub drag_start: (f64, f64),
    pub drag_offset_start: (f32, f32),
    pub mouse_pos: (f64, f64),

    // Key-hold repeat state
    pub initial_delay: f64,
    pub repeat_delay: f64,
    pub nav_hold_timer: f64,
    pub nav_past_initial: bool,
    pub last_frame: Instant,

    // Keys currently held / pressed this frame
    pub keys_down: HashSet<NamedKey>,
    pub chars_down: HashSet<char>,
    pub keys_pressed: HashSet<NamedKey>,
    pub chars_pressed: HashSet<char>,

    // Mouse wheel accumulator for this frame
    pub wheel_y: f32,
}

impl ViewerState {
    pub fn new(
        buffer: PageBuffer,
        settings: Settings,
        initial_delay: f64,
        repeat_delay: f64,
    ) -> Self {
        Self {
            buffer,
            settings,
            status_message: None,
            zoom: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            strip_scroll: 0.0,
            show_info: true,
            show_help: false,
            is_fullscreen: false,
            dragging: false,
            drag_start: (0.0, 0.0),
            drag_offset_start: (0.0, 0.0),
            mouse_pos: (0.0, 0.0),
            initial_delay,
            repeat_delay,
            nav_hold_timer: 0.0,
            nav_past_initial: false,
            last_frame: Instant::now(),
            keys_down: HashSet::new(),
            chars_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            chars_pressed: HashSet::new(),
            wheel_y: 0.0,
        }
    }

    pub fn is_key_pressed_named(&self, k: NamedKey) -> bool {
        self.keys_pressed.contains(&k)
    }

    pub fn is_char_pressed(&self, c: char) -> bool {
        self.chars_pressed.contains(&c)
    }

    pub fn is_key_down_named(&self, k: NamedKey) -> bool {
        self.keys_down.contains(&k)
    }

    pub fn is_char_down(&self, c: char) -> bool {
        self.chars_down.contains(&c)
    }

    fn reset_view(&mut self) {
        self.zoom = 0.0;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.strip_scroll = 0.0;
    }

    /// Run the per-frame logic: input handling, navigation, dialogs.
    /// Returns true if the app should quit.
    pub fn update(&mut self, window: &Window) -> bool {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;

        if self.is_key_pressed_named(NamedKey::Escape) || self.is_char_pressed('q') {
            return true;
        }

        // ------------------------------------------------------------------
        // Page navigation (with key-hold repeat)
        // ------------------------------------------------------------------
        let fwd_down = self.is_key_down_named(NamedKey::ArrowRight)
            || self.is_key_down_named(NamedKey::Space)
            || self.is_key_down_named(NamedKey::PageDown)
            || self.is_char_down('l');
        let bwd_down = self.is_key_down_named(NamedKey::ArrowLeft)
            || self.is_key_down_named(NamedKey::PageUp)
            || self.is_char_down('h');
        let fwd_pressed = self.is_key_pressed_named(NamedKey::ArrowRight)
            || self.is_key_pressed_named(NamedKey::Space)
            || self.is_key_pressed_named(NamedKey::PageDown)
            || self.is_char_pressed('l');
        let bwd_pressed = self.is_key_pressed_named(NamedKey::ArrowLeft)
            || self.is_key_pressed_named(NamedKey::PageUp)
            || self.is_char_pressed('h');

        let mut nav: Option<Direction> = None;
        if fwd_pressed || bwd_pressed {
            nav = Some(if fwd_pressed { Direction::Forward } else { Direction::Backward });
            self.nav_hold_timer = 0.0;
            self.nav_past_initial = false;
        } else if fwd_down || bwd_down {
            self.nav_hold_timer += dt;
            if !self.nav_past_initial {
                if self.nav_hold_timer >= self.initial_delay {
                    nav = Some(if fwd_down { Direction::Forward } else { Direction::Backward });
                    self.nav_hold_timer = 0.0;
                    self.nav_past_initial = true;
                }
            } else if self.nav_hold_timer >= self.repeat_delay {
                nav = Some(if fwd_down { Direction::Forward } else { Direction::Backward });
                self.nav_hold_timer -= self.repeat_delay;
            }
        } else {
            self.nav_hold_timer = 0.0;
            self.nav_past_initial = false;
        }

        if let Some(direction) = nav {
            let before = self.buffer.cursor();
            if self.buffer.advance(direction) != before {
                self.reset_view();
            }
        }

        if self.is_key_pressed_named(NamedKey::Home) {
            self.buffer.go_to(0);
            self.reset_view();
        } else if self.is_key_pressed_named(NamedKey::End) {
            let last = self.buffer.page_count().saturating_sub(1);
            self.buffer.go_to(last);
            self.reset_view();
        }

        // ------------------------------------------------------------------
        // Display modes
        // ------------------------------------------------------------------
        if self.is_char_pressed('d') {
            let on = !self.buffer.double_page();
            self.buffer.set_double_page(on);
            self.reset_view();
        }
        if self.is_char_pressed('s') {
            let on = !self.buffer.long_strip();
            self.buffer.set_long_strip(on);
            self.reset_view();
        }

        // ------------------------------------------------------------------
        // Folder picking
        // ------------------------------------------------------------------
        if self.is_char_pressed('o') {
            self.open_folder_dialog();
        }

        // ------------------------------------------------------------------
        // Overlays / window
        // ------------------------------------------------------------------
        if self.is_char_pressed('i') {
            self.show_info = !self.show_info;
        }
        if self.is_char_pressed('?') {
            self.show_help = !self.show_help;
        }
        if self.is_char_pressed('f') {
            self.is_fullscreen = !self.is_fullscreen;
            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
            } else {
                window.set_fullscreen(None);
            }
            self.reset_view();
        }

        // ------------------------------------------------------------------
        // Zoom / scroll
        // ------------------------------------------------------------------
        if self.is_char_pressed('z') {
            self.zoom = 0.0;
            self.offset_x = 0.0;
            self.offset_y = 0.0;
        }

        let wheel = self.wheel_y;
        if self.buffer.long_strip() {
            if wheel.abs() > 0.1 {
                self.strip_scroll -= wheel * STRIP_SCROLL_STEP;
                // Clamped against the page height during render.
            }
        } else {
            let zoom_in = self.is_char_pressed('=') || self.is_char_pressed('+');
            let zoom_out = self.is_char_pressed('-');
            let zoom_delta = if zoom_in {
                ZOOM_STEP
            } else if zoom_out {
                -ZOOM_STEP
            } else if wheel.abs() > 0.1 {
                wheel.signum() * ZOOM_STEP
            } else {
                0.0
            };
            if zoom_delta != 0.0 {
                if let Some(page) = self.buffer.current_page() {
                    let size = window.inner_size();
                    let old_zoom = if self.zoom == 0.0 {
                        fit_scale(
                            page.width as f32,
                            page.height as f32,
                            size.width.max(1) as f32,
                            size.height.max(1) as f32,
                        )
                    } else {
                        self.zoom
                    };
                    self.zoom = (old_zoom + zoom_delta).max(MIN_ZOOM);
                }
            }
        }

        // Clear per-frame input state
        self.keys_pressed.clear();
        self.chars_pressed.clear();
        self.wheel_y = 0.0;

        false
    }

    fn open_folder_dialog(&mut self) {
        let mut dialog = rfd::FileDialog::new().set_title("Open comic folder");
        if let Some(last) = &self.settings.last_folder {
            dialog = dialog.set_directory(last);
        }
        // Cancel leaves everything as it was.
        let Some(folder) = dialog.pick_folder() else {
            return;
        };

        match self.buffer.load_folder(&folder) {
            Ok(0) => {
                self.status_message = Some(format!("No images found in {}", folder.display()));
                self.reset_view();
            }
            Ok(_) => {
                self.status_message = None;
                self.reset_view();
                self.settings.remember_folder(&folder);
                if let Err(e) = self.settings.save() {
                    log::warn!("could not save settings: {}", e);
                }
            }
            Err(e) => {
                self.status_message = Some(format!("Could not open folder: {}", e));
            }
        }
    }

    // ----------------------------------------------------------------------
    // Rendering
    // ----------------------------------------------------------------------

    /// Render into the softbuffer framebuffer (u32 per pixel, 0x00RRGGBB).
    pub fn render(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let bg = rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]);
        frame.fill(bg);

        if self.buffer.is_empty() {
            let text = "No pages loaded - press 'o' to open a folder";
            let tx = (fb_w as i32 / 2 - text.len() as i32 * 6).max(10);
            draw_text(frame, fb_w, fb_h, text, tx, fb_h as i32 / 2, 2, (200, 200, 200, 255));
        } else if self.buffer.long_strip() {
            self.render_long_strip(frame, fb_w, fb_h);
        } else if self.buffer.double_page() {
            self.render_double_page(frame, fb_w, fb_h);
        } else {
            self.render_single_page(frame, fb_w, fb_h);
        }

        if self.show_info {
            self.render_info_bar(frame, fb_w, fb_h);
        }

        if let Some(msg) = self.status_message.clone() {
            let y = fb_h as i32 - 28;
            fill_rect(frame, fb_w, fb_h, 0, y - 4, fb_w, 28, (0, 0, 0, 178));
            draw_text(frame, fb_w, fb_h, &msg, 10, y, 2, (255, 120, 120, 255));
        }

        if self.show_help {
            fill_rect(frame, fb_w, fb_h, 0, 0, fb_w, fb_h, (0, 0, 0, 200));
            let mut y = 20;
            for line in HELP_KEYS.lines() {
                draw_text(frame, fb_w, fb_h, line, 20, y, 2, (255, 255, 255, 255));
                y += 24;
            }
        }
    }

    fn render_single_page(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let Some(page) = self.buffer.current_page() else {
            self.draw_unreadable_page(frame, fb_w, fb_h);
            return;
        };
        let sw = fb_w as f32;
        let sh = fb_h as f32;
        let scale = if self.zoom == 0.0 {
            fit_scale(page.width as f32, page.height as f32, sw, sh)
        } else {
            self.zoom
        };
        let draw_w = page.width as f32 * scale;
        let draw_h = page.height as f32 * scale;
        let x0 = (sw - draw_w) / 2.0 + self.offset_x;
        let y0 = (sh - draw_h) / 2.0 + self.offset_y;
        blit_scaled(frame, fb_w, fb_h, &page.rgba_bytes, page.width, page.height, x0, y0, scale);
    }

    fn render_double_page(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let (left, right) = self.buffer.current_pages();
        if left.is_none() && right.is_none() {
            self.draw_unreadable_page(frame, fb_w, fb_h);
            return;
        }
        let half_w = (fb_w.saturating_sub(PAGE_GAP)) / 2;
        let sh = fb_h as f32;

        if let Some(page) = left {
            let scale = fit_scale(page.width as f32, page.height as f32, half_w as f32, sh);
            let draw_w = page.width as f32 * scale;
            let draw_h = page.height as f32 * scale;
            // Right-align against the gutter so the spread reads as one unit.
            let x0 = half_w as f32 - draw_w;
            let y0 = (sh - draw_h) / 2.0;
            blit_scaled(frame, fb_w, fb_h, &page.rgba_bytes, page.width, page.height, x0, y0, scale);
        }
        if let Some(page) = right {
            let scale = fit_scale(page.width as f32, page.height as f32, half_w as f32, sh);
            let draw_h = page.height as f32 * scale;
            let x0 = (half_w + PAGE_GAP) as f32;
            let y0 = (sh - draw_h) / 2.0;
            blit_scaled(frame, fb_w, fb_h, &page.rgba_bytes, page.width, page.height, x0, y0, scale);
        }
    }

    fn render_long_strip(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let Some(page) = self.buffer.current_page() else {
            self.draw_unreadable_page(frame, fb_w, fb_h);
            return;
        };
        let scale = fit_width_scale(page.width as f32, fb_w as f32);
        let draw_h = page.height as f32 * scale;
        let max_scroll = (draw_h - fb_h as f32).max(0.0);
        self.strip_scroll = self.strip_scroll.clamp(0.0, max_scroll);
        blit_scaled(
            frame, fb_w, fb_h,
            &page.rgba_bytes, page.width, page.height,
            0.0, -self.strip_scroll, scale,
        );
    }

    fn draw_unreadable_page(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let text = "Page could not be decoded";
        draw_text(frame, fb_w, fb_h, text, 20, fb_h as i32 / 2, 2, (255, 80, 80, 255));
    }

    fn render_info_bar(&mut self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let Some(status) = self.buffer.status() else {
            return;
        };
        let line1 = format!(
            "[{}/{}] {}",
            status.current_index + 1,
            status.total_pages,
            status.file_name,
        );
        let line2 = if let Some(page) = self.buffer.current_page() {
            format!(
                "{}x{} | {:.1} KB",
                page.width,
                page.height,
                page.file_size as f64 / 1024.0,
            )
        } else {
            "unreadable page".to_string()
        };
        let (cached, used, budget) = self.buffer.cache_stats();
        let line3 = format!(
            "cache: {}/{} pages | {:.0}/{:.0} MB",
            cached,
            status.total_pages,
            used as f64 / (1024.0 * 1024.0),
            budget as f64 / (1024.0 * 1024.0),
        );

        let text_scale: u32 = 2;
        let line_h = (7 * text_scale + 4) as i32;
        let bar_h = (line_h * 3 + 8) as u32;
        fill_rect(frame, fb_w, fb_h, 0, 0, fb_w, bar_h, (0, 0, 0, 178));
        let white = (255, 255, 255, 255);
        draw_text(frame, fb_w, fb_h, &line1, 10, 4, text_scale, white);
        draw_text(frame, fb_w, fb_h, &line2, 10, 4 + line_h, text_scale, white);
        draw_text(frame, fb_w, fb_h, &line3, 10, 4 + line_h * 2, text_scale, white);
    }
}

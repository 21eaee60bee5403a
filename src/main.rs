//! Drowsy Drive entry point
//!
//! Handles platform-specific initialization and runs the animation loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;
    use wasm_bindgen::prelude::*;
    use web_sys::{
        CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, HtmlElement,
        KeyboardEvent, MouseEvent, Window,
    };

    use drowsy_drive::audio::AudioCues;
    use drowsy_drive::consts::IDLE_SPEED_MPH;
    use drowsy_drive::road::{Color, Road, Surface};
    use drowsy_drive::script;
    use drowsy_drive::seq::{DimParams, FrameInput, PlayContext, Player, Scheduler, StageEvent};

    /// Canvas 2D implementation of the road's drawing surface
    struct CanvasSurface {
        canvas: HtmlCanvasElement,
        ctx: CanvasRenderingContext2d,
    }

    impl Surface for CanvasSurface {
        fn size(&self) -> Vec2 {
            Vec2::new(self.canvas.width() as f32, self.canvas.height() as f32)
        }

        fn clear(&mut self) {
            let size = self.size();
            self.ctx
                .clear_rect(0.0, 0.0, size.x as f64, size.y as f64);
        }

        fn fill_quad(&mut self, quad: &[Vec2; 4], color: Color) {
            self.ctx.set_fill_style_str(&color.to_css());
            self.ctx.begin_path();
            self.ctx.move_to(quad[0].x as f64, quad[0].y as f64);
            self.ctx.line_to(quad[1].x as f64, quad[1].y as f64);
            self.ctx.line_to(quad[2].x as f64, quad[2].y as f64);
            self.ctx.line_to(quad[3].x as f64, quad[3].y as f64);
            self.ctx.close_path();
            self.ctx.fill();
        }
    }

    /// Per-character text reveal. Completion feeds back as
    /// `FrameInput::typing_done`.
    struct TypingEffect {
        span: Element,
        chars: Vec<char>,
        shown: usize,
        next_at: f64,
        char_delay_ms: f64,
    }

    impl TypingEffect {
        fn begin(
            document: &Document,
            display: &Element,
            text: &str,
            char_delay_ms: f64,
            now: f64,
        ) -> Option<Self> {
            let span = document.create_element("span").ok()?;
            span.set_class_name("typed");
            display.append_child(&span).ok()?;
            Some(Self {
                span,
                chars: text.chars().collect(),
                shown: 0,
                next_at: now + char_delay_ms,
                char_delay_ms,
            })
        }

        /// Returns true once the final character has landed.
        fn advance(&mut self, now: f64) -> bool {
            let mut changed = false;
            while self.shown < self.chars.len() && now >= self.next_at {
                self.shown += 1;
                self.next_at += self.char_delay_ms;
                changed = true;
            }
            if changed {
                let text: String = self.chars[..self.shown].iter().collect();
                self.span.set_text_content(Some(&text));
            }
            self.shown == self.chars.len()
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum DimPhase {
        Waiting { until: f64 },
        FadeOut { from: f64, to: f64, start: f64, end: f64 },
        Hold { until: f64, depth: f64 },
        FadeIn { from: f64, start: f64, end: f64 },
    }

    /// Probabilistic opacity oscillation on the scene element - the
    /// simulated microsleep.
    struct Dimmer {
        target: HtmlElement,
        params: DimParams,
        phase: DimPhase,
        opacity: f64,
    }

    /// Jittered duration: `base ± frac`, uniform
    fn jitter(base: f64, frac: f64, rng: &mut Pcg32) -> f64 {
        base * (1.0 + rng.random_range(-frac..=frac))
    }

    impl Dimmer {
        fn new(target: HtmlElement, params: DimParams, now: f64) -> Self {
            Self {
                target,
                phase: DimPhase::Waiting {
                    until: now + params.delay_ms,
                },
                params,
                opacity: 1.0,
            }
        }

        fn set_opacity(&mut self, value: f64) {
            self.opacity = value;
            let _ = self
                .target
                .style()
                .set_property("opacity", &format!("{value:.3}"));
        }

        fn advance(&mut self, now: f64, rng: &mut Pcg32) {
            match self.phase {
                DimPhase::Waiting { until } if now >= until => {
                    if rng.random::<f64>() < self.params.probability {
                        let (min, max) = (self.params.min_opacity, self.params.max_opacity);
                        let depth = if max > min {
                            rng.random_range(min..max)
                        } else {
                            min
                        };
                        let transition = jitter(self.params.transition_ms, 0.2, rng);
                        self.phase = DimPhase::FadeOut {
                            from: self.opacity,
                            to: depth,
                            start: now,
                            end: now + transition,
                        };
                    } else {
                        self.phase = DimPhase::Waiting {
                            until: now + jitter(self.params.delay_ms, 0.3, rng),
                        };
                    }
                }
                DimPhase::FadeOut {
                    from,
                    to,
                    start,
                    end,
                } => {
                    let k = ((now - start) / (end - start).max(1.0)).clamp(0.0, 1.0);
                    self.set_opacity(from + (to - from) * k);
                    if now >= end {
                        self.phase = DimPhase::Hold {
                            until: now + jitter(self.params.delay_ms, 0.3, rng),
                            depth: to,
                        };
                    }
                }
                DimPhase::Hold { until, depth } if now >= until => {
                    let transition = jitter(self.params.transition_ms, 0.2, rng);
                    self.phase = DimPhase::FadeIn {
                        from: depth,
                        start: now,
                        end: now + transition,
                    };
                }
                DimPhase::FadeIn { from, start, end } => {
                    let k = ((now - start) / (end - start).max(1.0)).clamp(0.0, 1.0);
                    self.set_opacity(from + (1.0 - from) * k);
                    if now >= end {
                        self.set_opacity(1.0);
                        self.phase = DimPhase::Waiting {
                            until: now + jitter(self.params.delay_ms, 0.3, rng),
                        };
                    }
                }
                _ => {}
            }
        }

        /// Restore full opacity on shutdown.
        fn stop(mut self) {
            self.set_opacity(1.0);
        }
    }

    /// DOM collaborators looked up once at startup
    struct StageElements {
        display: Element,
        stats: HtmlElement,
        timer: HtmlElement,
        scene: HtmlElement,
        prev_btn: Element,
        next_btn: Element,
    }

    type ArrowSlot = Rc<RefCell<Option<Closure<dyn FnMut(KeyboardEvent)>>>>;

    /// Application state for the animation loop
    struct App {
        player: Player,
        road: Road,
        timers: Scheduler,
        rng: Pcg32,
        input: FrameInput,
        events: Vec<StageEvent>,
        surface: CanvasSurface,
        typing: Option<TypingEffect>,
        dimmer: Option<Dimmer>,
        audio: AudioCues,
        document: Document,
        stage: StageElements,
        arrow_keys: ArrowSlot,
        last_now: f64,
    }

    impl App {
        /// First activation of the narrative.
        fn begin(&mut self, now: f64) -> Vec<StageEvent> {
            let fired = Vec::new();
            let mut ctx = PlayContext {
                now,
                road: &mut self.road,
                timers: &mut self.timers,
                rng: &mut self.rng,
                fired: &fired,
                events: &mut self.events,
            };
            self.player.begin(&mut ctx);
            std::mem::take(&mut self.events)
        }

        /// One animation frame: pump the scheduler, run the sequencer,
        /// advance the road and ambient effects. Returns the stage events to
        /// apply.
        fn step(&mut self, now: f64) -> Vec<StageEvent> {
            self.last_now = now;

            if let Some(typing) = &mut self.typing {
                if typing.advance(now) {
                    self.typing = None;
                    self.input.typing_done = true;
                }
            }

            let fired = self.timers.fire_due(now);
            let input = self.input;
            // Clear one-shot inputs after processing
            self.input = FrameInput::default();
            {
                let mut ctx = PlayContext {
                    now,
                    road: &mut self.road,
                    timers: &mut self.timers,
                    rng: &mut self.rng,
                    fired: &fired,
                    events: &mut self.events,
                };
                self.player.update(&input, &mut ctx);
            }

            // The road and the dimmer run independently of the current
            // segment.
            self.road.advance(now);
            self.road.render(&mut self.surface);
            if let Some(dimmer) = &mut self.dimmer {
                dimmer.advance(now, &mut self.rng);
            }

            std::mem::take(&mut self.events)
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Drowsy Drive starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("road")
            .expect("no road canvas")
            .dyn_into()
            .expect("not a canvas");
        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .expect("context lookup failed")
            .expect("no 2d context")
            .dyn_into()
            .expect("not a 2d context");

        resize_canvas(&window, &document, &canvas);
        setup_resize_handler(&window, &document, &canvas);

        let stage = StageElements {
            display: document.get_element_by_id("display").expect("no #display"),
            stats: html_element(&document, "stats"),
            timer: html_element(&document, "timer"),
            scene: html_element(&document, "scene"),
            prev_btn: document.get_element_by_id("prev").expect("no #prev"),
            next_btn: document.get_element_by_id("next").expect("no #next"),
        };

        let mut road = Road::new();
        road.set_speed(IDLE_SPEED_MPH);
        if !road.activate() {
            log::error!("Road render loop already active");
            return;
        }

        let player = match Player::new(script::narrative()) {
            Ok(player) => player,
            Err(err) => {
                log::error!("Invalid narrative: {err}");
                return;
            }
        };

        let seed = js_sys::Date::now() as u64;
        log::info!("Session seed: {seed}");

        let app = Rc::new(RefCell::new(App {
            player,
            road,
            timers: Scheduler::new(),
            rng: Pcg32::seed_from_u64(seed),
            input: FrameInput::default(),
            events: Vec::new(),
            surface: CanvasSurface { canvas, ctx: context },
            typing: None,
            dimmer: None,
            audio: AudioCues::new(),
            document: document.clone(),
            stage,
            arrow_keys: Rc::new(RefCell::new(None)),
            last_now: 0.0,
        }));

        let events = app.borrow_mut().begin(0.0);
        apply_events(&app, events);

        setup_input_handlers(&window, &document, app.clone());
        request_animation_frame(app);

        log::info!("Drowsy Drive running!");
    }

    fn html_element(document: &Document, id: &str) -> HtmlElement {
        document
            .get_element_by_id(id)
            .unwrap_or_else(|| panic!("no #{id}"))
            .dyn_into()
            .unwrap_or_else(|_| panic!("#{id} is not an HtmlElement"))
    }

    /// Fill the viewport and scale the title typography with it.
    fn resize_canvas(window: &Window, document: &Document, canvas: &HtmlCanvasElement) {
        let width = window
            .inner_width()
            .ok()
            .and_then(|w| w.as_f64())
            .unwrap_or(1280.0);
        let height = window
            .inner_height()
            .ok()
            .and_then(|h| h.as_f64())
            .unwrap_or(720.0);
        canvas.set_width(width as u32);
        canvas.set_height(height as u32);

        let aspect = width / height.max(1.0);
        if let Some(title) = document
            .get_element_by_id("title")
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        {
            let style = title.style();
            let _ = style.set_property("top", &format!("{}px", height * 0.005 * aspect));
            let _ = style.set_property("left", &format!("{}px", width * 0.0075));
            let _ = style.set_property("font-size", &format!("{}px", width * 0.025));
        }
        if let Some(subtitle) = document
            .get_element_by_id("subtitle")
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        {
            let style = subtitle.style();
            let _ = style.set_property("font-size", &format!("{}px", width * 0.0085));
            let _ = style.set_property("margin-top", &format!("{}px", -height * 0.01));
        }
    }

    fn setup_resize_handler(window: &Window, document: &Document, canvas: &HtmlCanvasElement) {
        let window_cb = window.clone();
        let document_cb = document.clone();
        let canvas_cb = canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            resize_canvas(&window_cb, &document_cb, &canvas_cb);
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_input_handlers(window: &Window, document: &Document, app: Rc<RefCell<App>>) {
        // Spacebar responses
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if event.key() == " " {
                    event.prevent_default();
                    app.borrow_mut().input.hit = true;
                }
            });
            let _ =
                window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Delegated clicks: navigation affordances anywhere in the content
        // drive the sequencer; everything else counts as a response.
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let target = event
                    .target()
                    .and_then(|t| t.dyn_into::<Element>().ok());
                let mut a = app.borrow_mut();
                if let Some(el) = target {
                    if el.closest(".nav-next").ok().flatten().is_some() {
                        a.input.next = true;
                        return;
                    }
                    if el.closest(".nav-prev").ok().flatten().is_some() {
                        a.input.previous = true;
                        return;
                    }
                }
                a.input.hit = true;
            });
            let _ = document
                .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    /// Arrow keys are bound only at the terminal segment, and each binding
    /// replaces the previous one - never stacks.
    fn bind_arrow_keys(app: &Rc<RefCell<App>>) {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .expect("no document");
        let slot: ArrowSlot = app.borrow().arrow_keys.clone();

        if let Some(old) = slot.borrow_mut().take() {
            let _ = document
                .remove_event_listener_with_callback("keydown", old.as_ref().unchecked_ref());
        }

        let app_cb = app.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            let mut a = app_cb.borrow_mut();
            match event.key().as_str() {
                "ArrowRight" => a.input.next = true,
                "ArrowLeft" => a.input.previous = true,
                _ => {}
            }
        });
        let _ =
            document.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        *slot.borrow_mut() = Some(closure);
    }

    /// Apply the frame's stage events to the DOM/audio layer.
    fn apply_events(app: &Rc<RefCell<App>>, events: Vec<StageEvent>) {
        let mut rebind_arrows = false;
        {
            let mut a = app.borrow_mut();
            let now = a.last_now;
            for event in events {
                match event {
                    StageEvent::ShowPanel => {
                        a.typing = None;
                        a.stage.display.set_inner_html("");
                    }
                    StageEvent::AppendSpan { html } => {
                        let _ = a
                            .stage
                            .display
                            .insert_adjacent_html("beforeend", &html);
                    }
                    StageEvent::BeginTyping {
                        text,
                        char_delay_ms,
                    } => {
                        a.typing = TypingEffect::begin(
                            &a.document,
                            &a.stage.display,
                            &text,
                            char_delay_ms,
                            now,
                        );
                    }
                    StageEvent::ClearStage => {
                        a.typing = None;
                        a.stage.display.set_inner_html("");
                    }
                    StageEvent::HideAux => {
                        let _ = a.stage.stats.set_attribute("class", "hidden");
                        let _ = a.stage.timer.set_attribute("class", "hidden");
                    }
                    StageEvent::ShowStats(show) => {
                        let class = if show { "" } else { "hidden" };
                        let _ = a.stage.stats.set_attribute("class", class);
                        let _ = a.stage.timer.set_attribute("class", class);
                        a.stage.stats.set_text_content(Some("hits: 0"));
                    }
                    StageEvent::StatHits(hits) => {
                        a.stage
                            .stats
                            .set_text_content(Some(&format!("hits: {hits}")));
                    }
                    StageEvent::Countdown(value) => {
                        a.stage.display.set_inner_html(&format!(
                            "<div class=\"countdown\">{value}</div>"
                        ));
                    }
                    StageEvent::TimeRemaining(seconds) => {
                        a.stage
                            .timer
                            .set_text_content(Some(&format!("{seconds} s")));
                    }
                    StageEvent::DimStart(params) => {
                        a.dimmer = Some(Dimmer::new(a.stage.scene.clone(), params, now));
                    }
                    StageEvent::DimStop => {
                        if let Some(dimmer) = a.dimmer.take() {
                            dimmer.stop();
                        }
                    }
                    StageEvent::ShowResults {
                        hits,
                        flickers,
                        error_pct,
                    } => {
                        a.stage.display.set_inner_html(&format!(
                            "<div class=\"results\">\
                             <p>Flashes: {flickers} &middot; Responses: {hits}</p>\
                             <p>Response error: {error_pct:.2}%</p>\
                             <p><span class=\"nav-next\">Continue &rarr;</span></p>\
                             </div>"
                        ));
                    }
                    StageEvent::NavState {
                        prev_enabled,
                        next_enabled,
                    } => {
                        let _ = a
                            .stage
                            .prev_btn
                            .class_list()
                            .toggle_with_force("disabled", !prev_enabled);
                        let _ = a
                            .stage
                            .next_btn
                            .class_list()
                            .toggle_with_force("disabled", !next_enabled);
                    }
                    StageEvent::BindArrowKeys => rebind_arrows = true,
                    StageEvent::PlayCue(cue) => a.audio.play(cue),
                }
            }
        }
        if rebind_arrows {
            bind_arrow_keys(app);
        }
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let window = web_sys::window().expect("no window");
        let closure = Closure::once(move |time: f64| {
            frame(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn frame(app: Rc<RefCell<App>>, time: f64) {
        let events = app.borrow_mut().step(time);
        apply_events(&app, events);
        request_animation_frame(app);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_app::run();
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use drowsy_drive::consts::IDLE_SPEED_MPH;
    use drowsy_drive::road::{Road, SpeedTimer};
    use drowsy_drive::script;
    use drowsy_drive::seq::{FrameInput, PlayContext, Player, Scheduler, StageEvent};

    /// Drive the full narrative against a synthetic clock, logging the stage
    /// events. Typing completions are fed back instantly and the results
    /// panel advances itself.
    pub fn run() {
        let mut road = Road::new();
        road.set_speed(IDLE_SPEED_MPH);
        let mut timers = Scheduler::new();
        let mut rng = Pcg32::seed_from_u64(0xD0D0);
        let mut events: Vec<StageEvent> = Vec::new();
        let mut player = Player::new(script::narrative()).expect("narrative is non-empty");

        {
            let fired = Vec::new();
            let mut ctx = PlayContext {
                now: 0.0,
                road: &mut road,
                timers: &mut timers,
                rng: &mut rng,
                fired: &fired,
                events: &mut events,
            };
            player.begin(&mut ctx);
        }

        let mut ticker = SpeedTimer::new(road.speed(), 0.0);
        let mut ticker_speed = road.speed();
        let mut input = FrameInput::default();
        let mut now = 0.0;

        while now < 180_000.0 {
            now += 100.0;
            let fired = timers.fire_due(now);
            {
                let mut ctx = PlayContext {
                    now,
                    road: &mut road,
                    timers: &mut timers,
                    rng: &mut rng,
                    fired: &fired,
                    events: &mut events,
                };
                player.update(&input, &mut ctx);
            }
            input = FrameInput::default();

            // Fixed-tick road driver: recreate the deadline on speed change.
            if road.speed() != ticker_speed {
                ticker_speed = road.speed();
                ticker.set_speed(ticker_speed, now);
            }
            for _ in 0..ticker.poll(now) {
                road.tick(now);
            }

            for event in events.drain(..) {
                match &event {
                    StageEvent::BeginTyping { .. } => input.typing_done = true,
                    StageEvent::ShowResults { .. } => input.next = true,
                    _ => {}
                }
                log::info!("{event:?}");
            }

            if timers.pending_count() == 0 && !input.typing_done && !input.next && now > 1000.0 {
                break;
            }
        }
        log::info!("Narrative complete at t={:.1}s", now / 1000.0);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Drowsy Drive (native) starting...");
    log::info!("Run with `trunk serve` for the interactive web version");
    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

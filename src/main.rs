mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use ringside::{
    app_dirs::AppDirs,
    callout::ComboCaller,
    catalog::{Catalog, ExerciseDef, Level, TechniqueCategory, WorkoutCategory},
    clock::{Clock, IntervalClock},
    coach::{Coach, SharedStore},
    config::{Config, ConfigStore, FileConfigStore},
    entitlement::StaticEntitlement,
    ledger::{export_csv, Achievement, RecordOutcome},
    plan::{CustomWorkout, WorkoutPlan},
    profile::Stance,
    runner::SessionRunner,
    runtime::{CoachEvent, CoachEventSource, CrosstermEventSource, Runner},
    session::CompletionEvent,
    store::{MemoryKvStore, SqliteKvStore},
    util::{days_ago, format_clock},
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

const FRAME_MS: u64 = 100;

/// terminal boxing coach with guided rounds and progress tracking
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal boxing coach: timed rounds with combo call-outs, a catalog of punches, combos and techniques, and a local training log with streaks and achievements."
)]
pub struct Cli {
    /// unlock premium workouts
    #[clap(long, global = true)]
    entitled: bool,

    /// path to the training database
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// keep all data in memory for this run
    #[clap(long, global = true)]
    ephemeral: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// list workouts
    Workouts {
        #[clap(short, long, value_enum)]
        level: Option<Level>,
        #[clap(short, long, value_enum)]
        category: Option<WorkoutCategory>,
    },
    /// list punches and their numbers
    Punches,
    /// list combos
    Combos {
        #[clap(short, long, value_enum)]
        level: Option<Level>,
    },
    /// list techniques
    Techniques {
        #[clap(short, long, value_enum)]
        category: Option<TechniqueCategory>,
        #[clap(short, long, value_enum)]
        level: Option<Level>,
    },
    /// show details for a workout, combo, punch or technique
    Show { id: String },
    /// run a guided workout
    Train { workout: String },
    /// drill a single combo for timed rounds
    Drill {
        combo: String,
        #[clap(short, long)]
        rounds: Option<u32>,
        #[clap(long)]
        round_secs: Option<u32>,
        #[clap(long)]
        rest_secs: Option<u32>,
    },
    /// manage your own workouts
    Custom {
        #[clap(subcommand)]
        action: CustomAction,
    },
    /// totals, streak and achievements
    Progress,
    /// completed sessions, newest first
    History {
        /// only the last N days
        #[clap(short, long)]
        days: Option<u32>,
        /// write CSV to stdout
        #[clap(long)]
        csv: bool,
    },
    /// erase the training log
    ResetProgress,
    /// view or edit your profile
    Profile {
        #[clap(long)]
        name: Option<String>,
        #[clap(long, value_enum)]
        stance: Option<Stance>,
        #[clap(long, value_enum)]
        level: Option<Level>,
        /// workouts per week
        #[clap(long)]
        goal: Option<u32>,
        #[clap(long)]
        weight: Option<f32>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CustomAction {
    /// save a workout built from exercises given as NAME:SECONDS[:COMBO,COMBO]
    Add {
        name: String,
        #[clap(short, long, default_value_t = 3)]
        rounds: u32,
        #[clap(long, default_value_t = 60)]
        rest_secs: u32,
        #[clap(short = 'e', long = "exercise", required = true, value_parser = parse_exercise)]
        exercises: Vec<ExerciseDef>,
    },
    List,
    Remove { id: String },
}

fn parse_exercise(s: &str) -> Result<ExerciseDef, String> {
    let mut parts = s.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err("exercise needs a name".to_string());
    }
    let duration_secs = parts
        .next()
        .ok_or_else(|| format!("'{s}' is missing :SECONDS"))?
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad duration in '{s}': {e}"))?;
    let combos = parts
        .next()
        .map(|c| {
            c.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    Ok(ExerciseDef {
        name: name.to_string(),
        duration_secs,
        combos,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Session,
    Results,
}

/// What the results screen shows
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub event: CompletionEvent,
    pub finished_all_rounds: bool,
    pub outcome: RecordOutcome,
}

pub struct App<'a, C: Clock> {
    pub coach: &'a Coach,
    pub runner: SessionRunner<C>,
    pub caller: ComboCaller,
    pub state: AppState,
    pub summary: Option<SessionSummary>,
}

impl<'a, C: Clock> App<'a, C> {
    pub fn new(coach: &'a Coach, runner: SessionRunner<C>, caller: ComboCaller) -> Self {
        let mut app = Self {
            coach,
            runner,
            caller,
            state: AppState::Session,
            summary: None,
        };
        app.caller.observe(app.runner.plan(), app.runner.state());
        app
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.coach.catalog()
    }

    fn complete(&mut self, event: CompletionEvent) {
        let finished_all_rounds = event.rounds_completed == self.runner.plan().rounds;
        let outcome = self.coach.record(&event);
        self.summary = Some(SessionSummary {
            event,
            finished_all_rounds,
            outcome,
        });
        self.state = AppState::Results;
    }

    /// Returns false when the app should quit.
    pub fn handle(&mut self, event: CoachEvent) -> bool {
        match event {
            CoachEvent::Tick { epoch } => {
                if let Some(done) = self.runner.on_tick(epoch) {
                    self.complete(done);
                }
                self.caller.observe(self.runner.plan(), self.runner.state());
                true
            }
            CoachEvent::Resize => true,
            CoachEvent::Key(key) => self.on_key(key),
        }
    }

    fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return false;
        }
        match self.state {
            AppState::Session => {
                let done = match key.code {
                    KeyCode::Esc | KeyCode::Char('q') => return false,
                    KeyCode::Char(' ') | KeyCode::Char('p') => {
                        self.runner.toggle_pause();
                        None
                    }
                    KeyCode::Char('s') | KeyCode::Right => self.runner.skip(),
                    KeyCode::Char('r') | KeyCode::Left => {
                        self.runner.restart();
                        None
                    }
                    KeyCode::Char('f') => self.runner.finish_early(),
                    _ => None,
                };
                if let Some(done) = done {
                    self.complete(done);
                }
                self.caller.observe(self.runner.plan(), self.runner.state());
                true
            }
            AppState::Results => !matches!(
                key.code,
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter
            ),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_path) = AppDirs::log_path() {
        ringside::logging::init(&log_path);
    }

    let config_store = FileConfigStore::new();
    let config = config_store.load();

    let store: SharedStore = if cli.ephemeral {
        Arc::new(MemoryKvStore::new())
    } else {
        let path = cli
            .db
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("ringside.db"));
        match SqliteKvStore::open(&path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(path = %path.display(), "falling back to in-memory storage: {e}");
                eprintln!("warning: could not open {} ({e}); nothing will be saved", path.display());
                Arc::new(MemoryKvStore::new())
            }
        }
    };
    let coach = Coach::new(
        store,
        Box::new(StaticEntitlement(cli.entitled || config.entitled)),
    );

    match cli.command.clone() {
        Command::Train { workout } => {
            let plan = coach.resolve(&workout)?;
            run_session(&coach, plan, &config)
        }
        Command::Drill {
            combo,
            rounds,
            round_secs,
            rest_secs,
        } => {
            let plan = coach.resolve_drill(
                &combo,
                rounds.unwrap_or(config.drill_rounds),
                round_secs.unwrap_or(config.drill_round_secs),
                rest_secs.unwrap_or(config.drill_rest_secs),
            )?;
            run_session(&coach, plan, &config)
        }
        command => {
            let mut out = io::stdout().lock();
            run_command(&coach, command, &mut out)
        }
    }
}

fn run_session(coach: &Coach, plan: WorkoutPlan, config: &Config) -> Result<(), Box<dyn Error>> {
    coach.authorize(&plan)?;
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let events = Runner::new(CrosstermEventSource::new(), Duration::from_millis(FRAME_MS));
    let clock = IntervalClock::new(Duration::from_millis(config.tick_millis.max(1)));
    let runner = coach.begin(plan, clock, events.sender())?;
    let mut app = App::new(coach, runner, ComboCaller::new(config.callout_every_secs));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &events);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let App {
        runner, summary, ..
    } = app;
    if summary.is_none() {
        runner.exit();
    }
    result?;

    if let Some(summary) = summary {
        println!(
            "{}: {} rounds, {}, ~{} kcal",
            if summary.finished_all_rounds {
                "Workout complete"
            } else {
                "Session saved"
            },
            summary.event.rounds_completed,
            format_clock(summary.event.elapsed_total_secs),
            summary.event.estimated_calories
        );
        for a in &summary.outcome.new_achievements {
            println!("Achievement unlocked: {a}");
        }
    }
    Ok(())
}

fn start_tui<B: Backend, C: Clock, E: CoachEventSource>(
    terminal: &mut Terminal<B>,
    app: &mut App<'_, C>,
    events: &Runner<E>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| ui(app, f))?;
        if let Some(event) = events.step() {
            if !app.handle(event) {
                break;
            }
        }
    }
    Ok(())
}

fn ui<C: Clock>(app: &mut App<'_, C>, f: &mut Frame) {
    ui::screen::current_screen(&app.state).render(app, f);
}

fn run_command<W: io::Write>(
    coach: &Coach,
    command: Command,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let catalog = coach.catalog();
    match command {
        Command::Workouts { level, category } => {
            for w in catalog.workouts_where(level, category) {
                let lock = if w.premium && !coach.is_entitled() {
                    " [premium]"
                } else {
                    ""
                };
                writeln!(
                    out,
                    "{:<22} {:<20} {:<13} {:<12} {} x {}{}",
                    w.id,
                    w.name,
                    w.category.to_string(),
                    w.level.to_string(),
                    w.rounds,
                    format_clock(w.exercises.iter().map(|e| e.duration_secs).sum()),
                    lock
                )?;
            }
            for w in coach.custom().list() {
                writeln!(out, "{:<22} {:<20} custom", w.id, w.name)?;
            }
        }
        Command::Punches => {
            for p in &catalog.punches {
                writeln!(out, "{}  {:<15} {:<9} {}", p.number, p.name, p.category.to_string(), p.description)?;
            }
        }
        Command::Combos { level } => {
            for c in catalog.combos_at(level) {
                writeln!(
                    out,
                    "{:<20} {:<24} {:<10} {}",
                    c.id,
                    c.name,
                    catalog.combo_numbers(c),
                    c.level.to_string()
                )?;
            }
        }
        Command::Techniques { category, level } => {
            for t in catalog.techniques_where(level, category) {
                writeln!(out, "{:<18} {:<24} {:<9} {}", t.id, t.name, t.category.to_string(), t.level.to_string())?;
            }
        }
        Command::Show { id } => show(coach, &id, out)?,
        Command::Custom { action } => match action {
            CustomAction::Add {
                name,
                rounds,
                rest_secs,
                exercises,
            } => {
                let saved = coach.custom().add(CustomWorkout {
                    id: String::new(),
                    name,
                    rounds,
                    rest_secs,
                    exercises,
                })?;
                writeln!(out, "saved {}", saved.id)?;
            }
            CustomAction::List => {
                for w in coach.custom().list() {
                    writeln!(
                        out,
                        "{:<28} {:<20} {} rounds, {} exercises",
                        w.id,
                        w.name,
                        w.rounds,
                        w.exercises.len()
                    )?;
                }
            }
            CustomAction::Remove { id } => {
                if coach.custom().remove(&id)? {
                    writeln!(out, "removed {id}")?;
                } else {
                    writeln!(out, "no custom workout '{id}'")?;
                }
            }
        },
        Command::Progress => progress(coach, out)?,
        Command::History { days, csv } => {
            let ledger = coach.progress().snapshot();
            let records: Vec<_> = match days.and_then(|d| history_cutoff(chrono::Local::now(), d)) {
                Some(cutoff) => ledger.since(cutoff),
                None => ledger.records.iter().collect(),
            };
            if csv {
                export_csv(records, &mut *out)?;
            } else {
                for r in records.iter().rev() {
                    writeln!(
                        out,
                        "{}  {:<22} {:>3} min {:>5} kcal {:>2} rounds",
                        r.completed_at.format("%Y-%m-%d %H:%M"),
                        r.workout_id,
                        r.duration_minutes,
                        r.calories_burned,
                        r.rounds_completed
                    )?;
                }
            }
        }
        Command::ResetProgress => {
            coach.progress().reset();
            writeln!(out, "progress cleared")?;
        }
        Command::Profile {
            name,
            stance,
            level,
            goal,
            weight,
        } => {
            let edited = name.is_some()
                || stance.is_some()
                || level.is_some()
                || goal.is_some()
                || weight.is_some();
            let profile = if edited {
                coach.profile().update(|p| {
                    if let Some(name) = name {
                        p.name = name;
                    }
                    if let Some(stance) = stance {
                        p.stance = stance;
                    }
                    if let Some(level) = level {
                        p.level = level;
                    }
                    if let Some(goal) = goal {
                        p.weekly_goal = goal;
                    }
                    if weight.is_some() {
                        p.weight_kg = weight;
                    }
                })?
            } else {
                coach.profile().get()
            };
            writeln!(out, "name:    {}", profile.name)?;
            writeln!(out, "stance:  {}", profile.stance)?;
            writeln!(out, "level:   {}", profile.level)?;
            writeln!(out, "goal:    {} workouts/week", profile.weekly_goal)?;
            if let Some(kg) = profile.weight_kg {
                writeln!(out, "weight:  {kg} kg")?;
            }
        }
        Command::Train { .. } | Command::Drill { .. } => {}
    }
    Ok(())
}

/// Start of an N-day history window. `None` when it reaches past what chrono can represent.
fn history_cutoff(
    now: chrono::DateTime<chrono::Local>,
    days: u32,
) -> Option<chrono::DateTime<chrono::Local>> {
    chrono::Duration::try_days(i64::from(days)).and_then(|span| now.checked_sub_signed(span))
}

fn show<W: io::Write>(coach: &Coach, id: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    let catalog = coach.catalog();
    if let Some(w) = catalog.workout(id) {
        writeln!(out, "{} ({}, {})", w.name, w.category, w.level)?;
        writeln!(out, "{}", w.description)?;
        writeln!(
            out,
            "{} rounds, {} rest, ~{} kcal{}",
            w.rounds,
            format_clock(w.rest_secs),
            w.calories,
            if w.premium { ", premium" } else { "" }
        )?;
        for ex in &w.exercises {
            writeln!(out, "  {} {}", format_clock(ex.duration_secs), ex.name)?;
            for combo in ex.combos.iter().filter_map(|c| catalog.combo(c)) {
                writeln!(out, "        {} ({})", combo.name, catalog.combo_numbers(combo))?;
            }
        }
    } else if let Some(c) = catalog.combo(id) {
        writeln!(out, "{} [{}] {}", c.name, catalog.combo_numbers(c), c.level)?;
        writeln!(out, "{}", catalog.combo_callout(c))?;
    } else if let Some(p) = catalog.punch(id) {
        writeln!(out, "{} {} ({})", p.number, p.name, p.category)?;
        writeln!(out, "{}", p.description)?;
    } else if let Some(t) = catalog.technique(id) {
        writeln!(out, "{} ({}, {})", t.name, t.category, t.level)?;
        writeln!(out, "{}", t.description)?;
        for tip in &t.tips {
            writeln!(out, "  - {tip}")?;
        }
    } else if let Some(w) = coach.custom().get(id) {
        writeln!(out, "{} (custom)", w.name)?;
        writeln!(out, "{} rounds, {} rest", w.rounds, format_clock(w.rest_secs))?;
        for ex in &w.exercises {
            writeln!(out, "  {} {}", format_clock(ex.duration_secs), ex.name)?;
        }
    } else {
        return Err(format!("nothing called '{id}'").into());
    }
    Ok(())
}

fn progress<W: io::Write>(coach: &Coach, out: &mut W) -> Result<(), Box<dyn Error>> {
    let ledger = coach.progress().snapshot();
    let agg = &ledger.aggregate;
    let today = chrono::Local::now().date_naive();
    let profile = coach.profile().get();
    let (done, goal) = profile.weekly_goal_progress(&ledger, today);

    writeln!(out, "workouts:       {}", agg.workouts_completed)?;
    writeln!(out, "time trained:   {} min", agg.total_time_minutes)?;
    writeln!(out, "calories:       {} kcal", agg.calories_burned)?;
    writeln!(
        out,
        "streak:         {} days (best {})",
        agg.live_streak(today),
        agg.longest_streak
    )?;
    writeln!(out, "this week:      {done}/{goal}")?;
    if let Some(avg) = ledger.average_minutes() {
        writeln!(out, "average:        {avg:.1} min")?;
    }
    if let Some(last) = agg.last_workout_date {
        writeln!(out, "last workout:   {}", days_ago(last, today))?;
    }
    writeln!(out)?;
    for a in Achievement::ALL {
        let mark = if agg.achievements.contains(&a) { "x" } else { " " };
        writeln!(out, "[{mark}] {:<17} {}", a.to_string(), a.description())?;
    }
    Ok(())
}

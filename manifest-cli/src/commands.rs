//! Subcommand handlers. Each maps onto one or two store calls.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use manifest_core::{
    DimensionPatch, DimensionYearData, NewDimension, ScoringSettings, Task, TaskInput, TaskPatch,
    current_year_key,
};
use manifest_store::{JsonFileBackend, PerformanceStore};
use std::collections::BTreeMap;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

#[derive(Subcommand, Debug)]
pub enum DimsCommand {
    /// List registered dimensions
    List,

    /// Register a new dimension
    Add {
        title: String,

        #[arg(long, default_value = "Cube")]
        icon: String,

        #[arg(long, default_value = "#673ab7")]
        color: String,
    },

    /// Rename or recolor a dimension
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        icon: Option<String>,

        #[arg(long)]
        color: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    /// Set a dimension's annual goal
    Annual {
        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        dim: String,

        text: String,
    },

    /// Set one quarterly goal (quarter 1-4)
    Quarter {
        #[arg(long)]
        year: Option<String>,

        #[arg(long)]
        dim: String,

        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        quarter: u8,

        text: String,
    },
}

/// Task fields shared by add and update.
#[derive(clap::Args, Debug, Default)]
pub struct TaskFields {
    #[arg(long)]
    pub description: Option<String>,

    /// not-started | in-progress | completed
    #[arg(long)]
    pub status: Option<String>,

    /// low | medium | high
    #[arg(long)]
    pub priority: Option<String>,

    /// 0-100
    #[arg(long, allow_negative_numbers = true)]
    pub score: Option<i64>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub start: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
}

/// Where a task lives. Month is 1-12; defaults to the current month.
#[derive(clap::Args, Debug)]
pub struct Bucket {
    #[arg(long)]
    pub year: Option<String>,

    #[arg(long)]
    pub dim: String,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
    pub month: Option<u8>,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task to a month
    Add {
        #[command(flatten)]
        bucket: Bucket,

        #[arg(long)]
        title: String,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Update fields of an existing task
    Update {
        #[command(flatten)]
        bucket: Bucket,

        #[arg(long)]
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        fields: TaskFields,
    },

    /// Delete a task
    Delete {
        #[command(flatten)]
        bucket: Bucket,

        #[arg(long)]
        id: String,
    },

    /// List a month's tasks
    List {
        #[command(flatten)]
        bucket: Bucket,
    },
}

pub struct App {
    store: PerformanceStore<JsonFileBackend>,
}

impl App {
    pub fn new(store: PerformanceStore<JsonFileBackend>) -> Self {
        Self { store }
    }

    /// Resolve the year (default: this year) and make sure it is loaded.
    async fn year(&self, year: Option<String>) -> Result<String> {
        let year = year.unwrap_or_else(|| current_year_key(self.store.config().timezone));
        self.store
            .load_year(&year)
            .await
            .with_context(|| format!("load year {year}"))?;
        Ok(year)
    }

    fn month_index(&self, month: Option<u8>) -> usize {
        match month {
            Some(m) => m as usize - 1,
            None => self.store.current_month(),
        }
    }

    pub async fn years(&self) -> Result<()> {
        let years = self.store.refresh_years().await?;
        if years.is_empty() {
            println!("(no years stored yet)");
        }
        for y in years {
            println!("{y}");
        }
        Ok(())
    }

    pub fn month(&self) {
        let m = self.store.current_month();
        println!("{} ({})", m + 1, MONTH_NAMES[m]);
    }

    pub async fn dims(&self, command: DimsCommand) -> Result<()> {
        match command {
            DimsCommand::List => {
                for d in self.store.all_dimension_configs() {
                    let tag = if d.is_default { " (default)" } else { "" };
                    println!("{:<16} {:<20} {} {}{}", d.id, d.title, d.icon, d.color, tag);
                }
            }
            DimsCommand::Add { title, icon, color } => {
                let id = self
                    .store
                    .add_dimension(NewDimension::new(title).icon(icon).color(color))
                    .await?;
                println!("Added dimension {id}");
            }
            DimsCommand::Edit {
                id,
                title,
                icon,
                color,
            } => {
                let d = self
                    .store
                    .update_dimension(&id, DimensionPatch { title, icon, color })
                    .await?;
                println!("Updated {}: {} {} {}", d.id, d.title, d.icon, d.color);
            }
        }
        Ok(())
    }

    pub async fn show(&self, year: Option<String>, dim: Option<String>, json: bool) -> Result<()> {
        let year = self.year(year).await?;
        let data = self
            .store
            .current_year_data(&year)
            .context("year not loaded")?;

        if json {
            let out = match &dim {
                Some(id) => serde_json::to_string_pretty(
                    data.dimensions.get(id).with_context(|| format!("no data for {id}"))?,
                )?,
                None => serde_json::to_string_pretty(&data)?,
            };
            println!("{out}");
            return Ok(());
        }

        println!("# {} (year score {:.2})\n", data.year, data.total_score);
        for (id, d) in &data.dimensions {
            if dim.as_deref().is_some_and(|want| want != id.as_str()) {
                continue;
            }
            let config = self.store.dimension_config(id);
            print_dimension(&config.title, d);
        }
        Ok(())
    }

    pub async fn goal(&self, command: GoalCommand) -> Result<()> {
        match command {
            GoalCommand::Annual { year, dim, text } => {
                let year = self.year(year).await?;
                self.store
                    .update_dimension_annual_goal(&year, &dim, text)
                    .await?;
                println!("Annual goal saved for {dim} {year}");
            }
            GoalCommand::Quarter {
                year,
                dim,
                quarter,
                text,
            } => {
                let year = self.year(year).await?;
                self.store
                    .update_dimension_quarterly_goal(&year, &dim, quarter as usize - 1, text)
                    .await?;
                println!("Q{quarter} goal saved for {dim} {year}");
            }
        }
        Ok(())
    }

    pub async fn task(&self, command: TaskCommand) -> Result<()> {
        match command {
            TaskCommand::Add {
                bucket,
                title,
                fields,
            } => {
                let year = self.year(bucket.year).await?;
                let month = self.month_index(bucket.month);
                let input = TaskInput {
                    title,
                    description: fields.description,
                    status: fields.status,
                    priority: fields.priority,
                    score: fields.score,
                    start_date: fields.start,
                    end_date: fields.end,
                };
                let task = self
                    .store
                    .add_monthly_task(&year, &bucket.dim, month, input)
                    .await?;
                println!("Added {} to {} {}", task.id, bucket.dim, MONTH_NAMES[month]);
                self.print_progress(&year, &bucket.dim);
            }
            TaskCommand::Update {
                bucket,
                id,
                title,
                fields,
            } => {
                let year = self.year(bucket.year).await?;
                let month = self.month_index(bucket.month);
                let patch = TaskPatch {
                    title,
                    description: fields.description,
                    status: fields.status,
                    priority: fields.priority,
                    score: fields.score,
                    start_date: fields.start,
                    end_date: fields.end,
                };
                if patch.is_empty() {
                    bail!("nothing to update (pass --title, --status, --score, ...)");
                }
                let task = self
                    .store
                    .update_monthly_task(&year, &bucket.dim, month, &id, patch)
                    .await?;
                print_task(&task);
                self.print_progress(&year, &bucket.dim);
            }
            TaskCommand::Delete { bucket, id } => {
                let year = self.year(bucket.year).await?;
                let month = self.month_index(bucket.month);
                self.store
                    .delete_monthly_task(&year, &bucket.dim, month, &id)
                    .await?;
                println!("Deleted {id}");
                self.print_progress(&year, &bucket.dim);
            }
            TaskCommand::List { bucket } => {
                let year = self.year(bucket.year).await?;
                let month = self.month_index(bucket.month);
                let dim = self
                    .store
                    .dimension_data(&year, &bucket.dim)
                    .with_context(|| format!("unknown dimension {}", bucket.dim))?;
                println!("## {} {} {}\n", bucket.dim, MONTH_NAMES[month], year);
                let tasks = &dim.monthly_tasks[month];
                if tasks.is_empty() {
                    println!("(no tasks)");
                }
                for t in tasks {
                    print_task(t);
                }
            }
        }
        Ok(())
    }

    pub async fn analysis(&self, year: Option<String>, dim: &str) -> Result<()> {
        let year = self.year(year).await?;
        let months = self
            .store
            .month_summaries(&year, dim)
            .with_context(|| format!("unknown dimension {dim}"))?;
        let current = self.store.current_month();
        println!("## {} {}\n", self.store.dimension_config(dim).title, year);
        for m in months {
            let marker = if m.month == current { "*" } else { " " };
            let bar = "#".repeat(m.progress as usize / 5);
            println!(
                "{marker}{:<10} {:>3}% {:<20} {}/{}",
                MONTH_NAMES[m.month], m.progress, bar, m.completed_tasks, m.total_tasks
            );
        }
        self.print_progress(&year, dim);
        Ok(())
    }

    pub async fn weights(&self, year: Option<String>, pairs: &[String]) -> Result<()> {
        let year = self.year(year).await?;
        let weights = parse_weights(pairs)?;
        self.store.update_year_weights(&year, weights).await?;
        let data = self.store.current_year_data(&year).context("year not loaded")?;
        println!("Year {} score {:.2}", year, data.total_score);
        Ok(())
    }

    pub async fn scoring(
        &self,
        year: Option<String>,
        dim: &str,
        completed: f64,
        in_progress: f64,
        not_started: f64,
    ) -> Result<()> {
        let year = self.year(year).await?;
        let current = self
            .store
            .dimension_data(&year, dim)
            .with_context(|| format!("unknown dimension {dim}"))?;
        let scoring = ScoringSettings {
            completed_score: completed,
            in_progress_score: in_progress,
            not_started_score: not_started,
            ..current.settings.scoring
        };
        self.store
            .update_dimension_scoring(&year, dim, scoring)
            .await?;
        self.print_progress(&year, dim);
        Ok(())
    }

    pub async fn delete_year(&self, year: &str) -> Result<()> {
        self.store.delete_year(year).await?;
        println!("Deleted year {year}");
        Ok(())
    }

    pub async fn reset(&self, yes: bool) -> Result<()> {
        if !yes {
            bail!("refusing to delete every year without --yes");
        }
        self.store.reset_all_data().await?;
        println!("All year data deleted");
        Ok(())
    }

    fn print_progress(&self, year: &str, dim: &str) {
        if let Some(d) = self.store.dimension_data(year, dim) {
            println!(
                "{dim} {year}: {}/{} done, progress {}%, score {:.2}",
                d.completed_tasks, d.total_tasks, d.progress, d.total_score
            );
        }
    }
}

fn print_dimension(title: &str, d: &DimensionYearData) {
    println!("## {title}");
    if !d.annual_goal.is_empty() {
        println!("Annual goal: {}", d.annual_goal);
    }
    for (i, q) in d.quarterly_goals.iter().enumerate() {
        if !q.is_empty() {
            println!("Q{}: {}", i + 1, q);
        }
    }
    println!(
        "Tasks: {}/{} done, progress {}%, score {:.2}\n",
        d.completed_tasks, d.total_tasks, d.progress, d.total_score
    );
}

fn print_task(t: &Task) {
    println!(
        "- [{}] {} ({}, score {}, {})",
        t.status, t.title, t.priority, t.score, t.id
    );
    if let Some(desc) = &t.description {
        println!("    {desc}");
    }
}

/// Parse `id=weight` pairs.
fn parse_weights(pairs: &[String]) -> Result<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let (id, w) = pair
            .split_once('=')
            .with_context(|| format!("expected id=weight, got '{pair}'"))?;
        let w: f64 = w
            .trim()
            .parse()
            .with_context(|| format!("bad weight in '{pair}'"))?;
        out.insert(id.trim().to_string(), w);
    }
    Ok(out)
}

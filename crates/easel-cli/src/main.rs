use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use chrono::TimeDelta;
use clap::Parser;
use tokio::time::{Duration, sleep};

use easel_core::app::{CoordinatorBuilder, IllustrationProcessor};
use easel_core::config::EaselConfig;
use easel_core::domain::{IllustrationTask, RenderError, TaskPriority, TaskType};
use easel_core::impls::{JsonFileTaskRepository, ManualNetworkMonitor};
use easel_core::ports::{
    Clock, IdGenerator, RenderBackend, RenderedIllustration, SystemClock, TaskRepository,
    UlidGenerator,
};
use easel_core::queue::TaskManager;

#[derive(Parser, Debug)]
#[command(name = "easel", version, about = "Render a story's illustrations through the task scheduler")]
struct Cli {
    /// Optional TOML config (scheduler / coordinator sections)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where task records are persisted; an existing file is resumed
    #[arg(long, default_value = "easel-tasks.json")]
    state_file: PathBuf,

    /// Number of page illustrations to seed for a fresh story
    #[arg(long, default_value_t = 4)]
    pages: u32,

    /// Make every Nth render fail (0: never)
    #[arg(long, default_value_t = 0)]
    fail_every: u32,

    /// Start offline and come online after this many milliseconds (0: start online)
    #[arg(long, default_value_t = 0)]
    offline_for_ms: u64,

    /// Simulated render time per illustration
    #[arg(long, default_value_t = 100)]
    render_ms: u64,
}

/// 画像生成の代わり：待ってからパスを返すだけ
struct SimulatedBackend {
    render_time: Duration,
    fail_every: u32,
    calls: AtomicU32,
}

#[async_trait]
impl RenderBackend for SimulatedBackend {
    async fn generate(&self, task: &IllustrationTask) -> Result<RenderedIllustration, RenderError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        sleep(self.render_time).await;

        if self.fail_every > 0 && call % self.fail_every == 0 {
            return Err(RenderError::Unreachable(format!("simulated outage on call {call}")));
        }
        let name = match task.task_type {
            TaskType::GlobalReference => "reference".to_string(),
            TaskType::PageIllustration => format!("page-{}", task.page_index.unwrap_or(0) + 1),
        };
        Ok(RenderedIllustration {
            path: format!("illustrations/{}/{name}.png", task.story_id),
        })
    }
}

/// 新しいストーリー：reference 画像 1 枚 + それに依存するページ
async fn seed_story(repository: &JsonFileTaskRepository, pages: u32) -> anyhow::Result<()> {
    let ids = UlidGenerator::new(SystemClock);
    let story_id = ids.generate_story_id();
    // restore order follows created_at
    let created_at = SystemClock.now();

    let reference = IllustrationTask::new(
        ids.generate_task_id(),
        story_id,
        ids.generate_page_id(),
        TaskPriority::Critical,
        TaskType::GlobalReference,
        created_at,
    );
    repository
        .save_task(&reference, 0, pages, "character and style reference", None)
        .await?;

    for index in 0..pages {
        // the cover page goes first
        let priority = if index == 0 {
            TaskPriority::High
        } else {
            TaskPriority::Medium
        };
        let page = IllustrationTask::new(
            ids.generate_task_id(),
            story_id,
            ids.generate_page_id(),
            priority,
            TaskType::PageIllustration,
            created_at + TimeDelta::milliseconds(i64::from(index) + 1),
        )
        .with_page_index(index)
        .with_dependencies([reference.id]);
        repository
            .save_task(&page, index + 1, pages, &format!("page {}", index + 1), None)
            .await?;
    }
    tracing::info!(%story_id, pages, "seeded new story");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // (A) 設定と永続化
    let config = match &cli.config {
        Some(path) => EaselConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EaselConfig::default(),
    };
    let repository = Arc::new(JsonFileTaskRepository::new(&cli.state_file));

    let unfinished = repository
        .fetch_all_pending()
        .await
        .with_context(|| format!("reading {}", cli.state_file.display()))?;
    if unfinished.is_empty() {
        seed_story(&repository, cli.pages).await?;
    } else {
        tracing::info!(records = unfinished.len(), "resuming unfinished story");
    }

    // (B) Coordinator を組み立てる
    let backend = Arc::new(SimulatedBackend {
        render_time: Duration::from_millis(cli.render_ms),
        fail_every: cli.fail_every,
        calls: AtomicU32::new(0),
    });
    let monitor = Arc::new(ManualNetworkMonitor::new(cli.offline_for_ms == 0));
    let coordinator = CoordinatorBuilder::new(TaskManager::with_config(&config.scheduler))
        .repository(repository.clone())
        .network_monitor(monitor.clone())
        .processor(Arc::new(IllustrationProcessor::new(
            Arc::clone(&repository),
            backend,
        )))
        .config(config.coordinator.clone())
        .build()?;

    // (C) 復元して開始（オフラインならここでは始まらない）
    let restored = coordinator.start().await?;
    println!("restored {restored} task(s)");

    if cli.offline_for_ms > 0 {
        sleep(Duration::from_millis(cli.offline_for_ms)).await;
        tracing::info!("simulating network coming back");
        monitor.set_connected(true);
    }

    // (D) 終わるまで待つ。失敗した reference に依存するページは永遠に待つので打ち切る
    let idle_limit = (cli.render_ms / 100 * 3).max(20);
    let mut idle_polls = 0;
    loop {
        let counts = coordinator.manager().pending_counts();
        if counts.pending == 0 {
            break;
        }
        idle_polls = if counts.eligible == 0 { idle_polls + 1 } else { 0 };
        if idle_polls >= idle_limit {
            tracing::warn!(blocked = counts.blocked, "remaining tasks cannot become eligible");
            break;
        }
        tokio::select! {
            _ = sleep(Duration::from_millis(100)) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    coordinator.shutdown().await;
    println!("final status: {:?}", coordinator.snapshot());
    Ok(())
}

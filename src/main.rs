use clap::Parser;
use cruise_ctd::adapters::m2m::Refdes;
use cruise_ctd::core::Pipeline;
use cruise_ctd::utils::error::ErrorSeverity;
use cruise_ctd::utils::{logger, validation::Validate};
use cruise_ctd::{
    CastSheetPipeline, CliConfig, Command, ComparisonPipeline, ConvertPipeline, CtdError,
    EtlEngine, LocalStorage, MappingPipeline, ToolConfig,
};

async fn run_pipeline<P: Pipeline>(pipeline: P, name: &str) -> cruise_ctd::Result<String> {
    EtlEngine::named(pipeline, name).run().await
}

async fn dispatch(cli: &CliConfig, config: ToolConfig) -> cruise_ctd::Result<String> {
    let storage = LocalStorage::new(config.output.path.clone());

    match &cli.command {
        Command::Compare(args) => {
            config.validate_credentials()?;
            let refdes = Refdes::parse(&args.refdes)?;
            let pipeline = ComparisonPipeline::new(storage, config, refdes, args.deployment.clone())
                .with_method(args.method.clone())
                .with_stream(args.stream.clone());
            run_pipeline(pipeline, "compare").await
        }
        Command::Convert(args) => {
            let pipeline = ConvertPipeline::new(storage, config, args.input.clone())
                .with_archive(args.archive.clone());
            run_pipeline(pipeline, "convert").await
        }
        Command::UpdateCasts(_) => {
            run_pipeline(CastSheetPipeline::new(storage, config), "update-casts").await
        }
        Command::UpdateMapping(args) => {
            let pipeline = MappingPipeline::new(storage, config, args.deployment_dir.clone());
            run_pipeline(pipeline, "update-mapping").await
        }
    }
}

fn exit_code(e: &CtdError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 遠端錯誤，可重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn fail(e: &CtdError) -> ! {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    // 驗證配置
    let config = match cli.validate().and_then(|_| cli.resolve()) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Err(e) = config.validate() {
        fail(&e);
    }
    tracing::debug!("Output directory: {}", config.output.path);

    match dispatch(&cli, config).await {
        Ok(output) => {
            println!("✅ {}", output);
        }
        Err(e) if e.severity() == ErrorSeverity::Low => {
            tracing::warn!("⚠️ {}", e);
            println!("{}", e.user_friendly_message());
        }
        Err(e) => fail(&e),
    }

    Ok(())
}

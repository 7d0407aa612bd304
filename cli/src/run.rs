use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use kondate_core::{
    default_registry, AdapterRegistry, CrawlOptions, CrawlReport, Crawler, EnexExporter,
    ExistingNotePolicy, NoteRenderer, NoteServiceClient, NotesCredential, Publisher,
    ReqwestClient, SiteConfig, SitesConfig,
};

use crate::{Cli, RunArgs};

pub async fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let sites = SitesConfig::load(&cli.config_yaml_filename)?;
    let registry = default_registry();

    let mut builder = ReqwestClient::builder();
    if let Some(ms) = cli.fetch_delay_ms {
        builder = builder.fetch_delay_ms(ms);
    }
    if cli.insecure {
        builder = builder.accept_invalid_certs(true);
    }
    let client = builder.build().context("Failed to build HTTP client")?;

    let remote = if args.use_local {
        None
    } else {
        let credential = NotesCredential::load(&cli.credential_json_filename)?;
        Some(NoteServiceClient::new(
            credential.endpoint,
            credential.token,
            credential.notebook_name,
        ))
    };

    let options = CrawlOptions {
        check_existing: !args.no_check_existed,
        existing_notes: if args.update_existed {
            ExistingNotePolicy::Update
        } else {
            ExistingNotePolicy::Skip
        },
    };
    let today = Local::now().date_naive();

    for (site_name, site) in sites.select(&args.sites) {
        if !registry.contains(site_name) {
            tracing::warn!(site = site_name, "no adapter for site, skipping");
            continue;
        }
        let site_run = SiteRun {
            cli,
            registry: &registry,
            client: &client,
            remote: remote.as_ref(),
            options,
            today,
        };
        match site_run.run(site_name, site).await {
            Ok(report) => tracing::info!(
                site = site_name,
                published = report.published(),
                "site done"
            ),
            Err(e) => tracing::error!(site = site_name, error = format!("{:#}", e), "site failed"),
        }
    }

    Ok(())
}

struct SiteRun<'a> {
    cli: &'a Cli,
    registry: &'a AdapterRegistry,
    client: &'a ReqwestClient,
    remote: Option<&'a NoteServiceClient>,
    options: CrawlOptions,
    today: NaiveDate,
}

impl SiteRun<'_> {
    async fn run(&self, site_name: &str, site: &SiteConfig) -> Result<CrawlReport> {
        let settings = site.to_settings(
            site_name,
            &self.cli.work_dir,
            &self.cli.processed_list_filename_postfix,
        );
        let adapter = self
            .registry
            .configure(settings)
            .with_context(|| format!("Failed to configure {}", site_name))?;
        let renderer = NoteRenderer::new(adapter.settings().tag_names.clone())?;

        let exporter;
        let publisher: &dyn Publisher = match self.remote {
            Some(remote) => remote,
            None => {
                exporter = EnexExporter::for_program(
                    &self.cli.work_dir,
                    adapter.program_name(),
                    self.today,
                )?;
                &exporter
            }
        };

        let report = Crawler::new(&*adapter, self.client, publisher, &renderer)
            .with_options(self.options)
            .run()
            .await
            .with_context(|| format!("Crawl of {} failed", site_name))?;
        Ok(report)
    }
}

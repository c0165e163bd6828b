// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
// Copyright (c) DUSK NETWORK. All rights reserved.

use std::io;

use anyhow::bail;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

pub struct Log {
    level: tracing::Level,
    filter: String,
    format: String,
}

impl Log {
    pub fn new(level: tracing::Level, filter: String, format: String) -> Self {
        Self {
            level,
            filter,
            format,
        }
    }

    fn subscriber(
        &self,
    ) -> SubscriberBuilder<DefaultFields, Format, EnvFilter> {
        tracing_subscriber::fmt::Subscriber::builder().with_env_filter(
            EnvFilter::new(self.filter.as_str())
                .add_directive(self.level.into()),
        )
    }

    pub fn register(self) -> anyhow::Result<()> {
        // stdout carries the reports
        let subscriber = self.subscriber().with_writer(io::stderr);
        match self.format.as_str() {
            "json" => {
                let subscriber = subscriber
                    .json()
                    .with_current_span(false)
                    .flatten_event(true)
                    .finish();
                tracing::subscriber::set_global_default(subscriber)?;
            }
            "plain" => {
                let subscriber = subscriber.with_ansi(false).finish();
                tracing::subscriber::set_global_default(subscriber)?;
            }
            "coloured" => {
                let subscriber = subscriber.finish();
                tracing::subscriber::set_global_default(subscriber)?;
            }
            other => bail!("unknown log type '{other}'"),
        }
        Ok(())
    }
}

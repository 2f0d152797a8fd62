// Copyright 2025 - developers of the `cordsweep` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Discord REST bindings for the deletion engine.
//!
//! Exactly two endpoints are spoken here: the paginated message search
//! (guild-wide or per direct-message channel) and the single-message
//! delete. [`RestClient`] implements the engine's [`Search`] and [`Delete`]
//! ports over them; everything else about the API is out of scope.

mod wire;

pub use wire::DecodeError;

use cordsweep_engine::ports::{Delete, DeleteReply, Search, SearchQuery, SearchReply};
use cordsweep_engine::{SearchScope, Snowflake, TransportError};
use log::debug;
use reqwest::StatusCode;
use url::Url;

/// API root for the generation of the service this tool targets. Throttle
/// bodies of this generation carry `retry_after` in milliseconds.
const DEFAULT_BASE_URL: &str = "https://discord.com/api/v6";

/// HTTP client for the two endpoints the deletion engine drives.
///
/// One instance serves any number of sequential runs. Clones share the
/// underlying connection pool, so the same client can be handed to the
/// engine as both its search and its delete port.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl RestClient {
    /// A client against the live service.
    pub fn new(token: impl Into<String>) -> Self {
        let base = Url::parse(DEFAULT_BASE_URL).expect("default base url is well-formed");
        Self::with_base_url(base, token)
    }

    /// A client against a different API root (proxies, test servers).
    pub fn with_base_url(base: Url, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            token: token.into(),
        }
    }

    fn search_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().expect("base url accepts path segments");
            match &query.scope {
                SearchScope::Guild { guild_id, .. } => {
                    path.push("guilds").push(&guild_id.to_string());
                }
                SearchScope::DirectMessages { channel_id } => {
                    path.push("channels").push(&channel_id.to_string());
                }
            }
            path.push("messages").push("search");
        }
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(author_id) = query.author_id {
                pairs.append_pair("author_id", &author_id.to_string());
            }
            // The guild shape narrows to one channel via a parameter; the
            // direct-message shape already addresses it in the path.
            if let SearchScope::Guild { channel_id, .. } = &query.scope {
                pairs.append_pair("channel_id", &channel_id.to_string());
            }
            if let Some(min_id) = query.min_id {
                pairs.append_pair("min_id", &min_id.to_string());
            }
            if let Some(max_id) = query.max_id {
                pairs.append_pair("max_id", &max_id.to_string());
            }
            pairs.append_pair("sort_by", "timestamp");
            pairs.append_pair("sort_order", "desc");
            pairs.append_pair("offset", &query.offset.to_string());
            if query.has_link {
                pairs.append_pair("has", "link");
            }
            if query.has_file {
                pairs.append_pair("has", "file");
            }
            if let Some(content) = &query.content {
                pairs.append_pair("content", content);
            }
            if query.include_nsfw {
                pairs.append_pair("include_nsfw", "true");
            }
        }
        url
    }

    fn delete_url(&self, channel_id: Snowflake, message_id: Snowflake) -> Url {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .expect("base url accepts path segments")
            .push("channels")
            .push(&channel_id.to_string())
            .push("messages")
            .push(&message_id.to_string());
        url
    }
}

impl Search for RestClient {
    async fn search(&mut self, query: &SearchQuery) -> Result<SearchReply, TransportError> {
        let url = self.search_url(query);
        debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.token.as_str())
            .send()
            .await
            .map_err(TransportError::new)?;
        let status = response.status();
        let body = response.text().await.map_err(TransportError::new)?;

        match status {
            StatusCode::ACCEPTED => Ok(SearchReply::IndexPending {
                retry_after: wire::retry_after(&body),
            }),
            StatusCode::TOO_MANY_REQUESTS => Ok(SearchReply::RateLimited {
                retry_after: wire::retry_after(&body),
            }),
            status if status.is_success() => {
                // A success body we cannot make sense of is as fatal as not
                // reaching the service at all.
                let page = wire::decode_page(&body).map_err(TransportError::new)?;
                Ok(SearchReply::Page(page))
            }
            status => Ok(SearchReply::ServerError {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

impl Delete for RestClient {
    async fn delete(
        &mut self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<DeleteReply, TransportError> {
        let url = self.delete_url(channel_id, message_id);
        debug!("DELETE {url}");
        let response = self
            .http
            .delete(url)
            .header("Authorization", self.token.as_str())
            .send()
            .await
            .map_err(TransportError::new)?;
        let status = response.status();
        if status.is_success() {
            return Ok(DeleteReply::Deleted);
        }
        let body = response.text().await.map_err(TransportError::new)?;

        match status {
            StatusCode::TOO_MANY_REQUESTS => Ok(DeleteReply::RateLimited {
                retry_after: wire::retry_after(&body),
            }),
            status => Ok(DeleteReply::ServerError {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new("secret-token")
    }

    fn guild_query() -> SearchQuery {
        SearchQuery {
            scope: SearchScope::Guild {
                guild_id: Snowflake::new(100),
                channel_id: Snowflake::new(200),
            },
            author_id: Some(Snowflake::new(300)),
            min_id: None,
            max_id: None,
            content: None,
            has_link: false,
            has_file: false,
            include_nsfw: false,
            offset: 0,
        }
    }

    #[test]
    fn guild_search_url() {
        let url = client().search_url(&guild_query());
        assert_eq!(
            url.as_str(),
            "https://discord.com/api/v6/guilds/100/messages/search\
             ?author_id=300&channel_id=200&sort_by=timestamp&sort_order=desc&offset=0"
        );
    }

    #[test]
    fn direct_message_search_url_omits_the_channel_parameter() {
        let mut query = guild_query();
        query.scope = SearchScope::DirectMessages {
            channel_id: Snowflake::new(200),
        };
        query.offset = 75;
        let url = client().search_url(&query);
        assert_eq!(
            url.as_str(),
            "https://discord.com/api/v6/channels/200/messages/search\
             ?author_id=300&sort_by=timestamp&sort_order=desc&offset=75"
        );
    }

    #[test]
    fn every_filter_lands_in_the_query_string() {
        let mut query = guild_query();
        query.min_id = Some(Snowflake::new(1));
        query.max_id = Some(Snowflake::new(2));
        query.content = Some("hello world".into());
        query.has_link = true;
        query.has_file = true;
        query.include_nsfw = true;
        let url = client().search_url(&query);
        assert_eq!(
            url.as_str(),
            "https://discord.com/api/v6/guilds/100/messages/search\
             ?author_id=300&channel_id=200&min_id=1&max_id=2\
             &sort_by=timestamp&sort_order=desc&offset=0\
             &has=link&has=file&content=hello+world&include_nsfw=true"
        );
    }

    #[test]
    fn delete_url_addresses_the_message_channel() {
        let url = client().delete_url(Snowflake::new(200), Snowflake::new(999));
        assert_eq!(
            url.as_str(),
            "https://discord.com/api/v6/channels/200/messages/999"
        );
    }
}

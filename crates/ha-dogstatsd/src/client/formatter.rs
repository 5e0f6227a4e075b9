use std::borrow::Cow;

use itoa::Integer;
use ryu::Float;
use smallvec::SmallVec;

use super::DogstatsdClient;
use crate::TagGroup;

impl DogstatsdClient {
    /// Gauge an integer value
    pub fn gauge<'a, T: Integer>(&'a mut self, name: &'a str, value: T) -> MetricFormatter<'a> {
        let mut buffer = itoa::Buffer::new();
        let value = buffer.format(value);
        self.gauge_value(name, SmallVec::from_slice(value.as_bytes()))
    }

    /// Gauge an integer value with a pre-built tag group
    pub fn gauge_with_tags<'a, T: Integer>(
        &'a mut self,
        name: &'a str,
        value: T,
        common_tags: &'a TagGroup,
    ) -> MetricFormatter<'a> {
        self.gauge(name, value).with_tag_group(common_tags)
    }

    /// Gauge a floating point value
    pub fn gauge_float<'a, T: Float>(&'a mut self, name: &'a str, value: T) -> MetricFormatter<'a> {
        let mut buffer = ryu::Buffer::new();
        let value = buffer.format(value);
        self.gauge_value(name, SmallVec::from_slice(value.as_bytes()))
    }

    /// Gauge a floating point value with a pre-built tag group
    pub fn gauge_float_with_tags<'a, T: Float>(
        &'a mut self,
        name: &'a str,
        value: T,
        common_tags: &'a TagGroup,
    ) -> MetricFormatter<'a> {
        self.gauge_float(name, value).with_tag_group(common_tags)
    }

    fn gauge_value<'a>(
        &'a mut self,
        name: &'a str,
        value: SmallVec<[u8; 16]>,
    ) -> MetricFormatter<'a> {
        let has_tags = self.tags.len() > 0;
        MetricFormatter {
            client: self,
            name,
            value,
            sample_rate: None,
            common_tags: None,
            local_tags: TagGroup::default(),
            has_tags,
        }
    }

    /// Build a Datadog event datagram.
    ///
    /// Events carry tags but never the client namespace.
    pub fn event<'a>(&'a mut self, title: &'a str, text: &'a str) -> EventFormatter<'a> {
        let has_tags = self.tags.len() > 0;
        EventFormatter {
            client: self,
            title,
            text,
            common_tags: None,
            local_tags: TagGroup::default(),
            has_tags,
        }
    }

    /// Build a Datadog event datagram with a pre-built tag group
    pub fn event_with_tags<'a>(
        &'a mut self,
        title: &'a str,
        text: &'a str,
        common_tags: &'a TagGroup,
    ) -> EventFormatter<'a> {
        self.event(title, text).with_tag_group(common_tags)
    }
}

/// Builder for a single gauge datagram
pub struct MetricFormatter<'a> {
    client: &'a mut DogstatsdClient,
    name: &'a str,
    value: SmallVec<[u8; 16]>,
    sample_rate: Option<f32>,
    common_tags: Option<&'a TagGroup>,
    local_tags: TagGroup,

    has_tags: bool,
}

impl<'a> MetricFormatter<'a> {
    pub fn with_tag_group(mut self, tags: &'a TagGroup) -> Self {
        if tags.len() > 0 {
            self.has_tags = true;
            self.common_tags = Some(tags);
        }
        self
    }

    pub fn with_tag<T: AsRef<str>>(mut self, key: &str, value: T) -> Self {
        // set has_tags later when send
        self.local_tags.add_tag(key, value);
        self
    }

    /// Sample this metric client-side.
    ///
    /// A rate below 1.0 keeps the datagram with that probability and stamps
    /// `|@rate` so the server can scale it back up. A rate of 1.0 or above
    /// always sends and stamps nothing.
    pub fn with_sample_rate(mut self, rate: f32) -> Self {
        if rate < 1.0 {
            self.sample_rate = Some(rate);
        }
        self
    }

    pub fn send(mut self) {
        if let Some(rate) = self.sample_rate {
            if rand::random::<f32>() >= rate {
                return;
            }
        }
        if self.local_tags.len() > 0 {
            self.has_tags = true;
        }

        let mut msg: Vec<u8> = Vec::with_capacity(64);
        if !self.client.namespace.is_empty() {
            msg.extend_from_slice(self.client.namespace.as_bytes());
            msg.push(b'.');
        }
        msg.extend_from_slice(self.name.as_bytes());
        msg.push(b':');
        msg.extend_from_slice(self.value.as_slice());
        msg.extend_from_slice(b"|g");

        if let Some(rate) = self.sample_rate {
            msg.extend_from_slice(b"|@");
            let mut buffer = ryu::Buffer::new();
            msg.extend_from_slice(buffer.format(rate).as_bytes());
        }

        if self.has_tags {
            append_tag_section(
                &mut msg,
                &self.client.tags,
                self.common_tags,
                &self.local_tags,
            );
        }

        self.client.emit(&msg);
    }
}

/// Builder for a single event datagram
pub struct EventFormatter<'a> {
    client: &'a mut DogstatsdClient,
    title: &'a str,
    text: &'a str,
    common_tags: Option<&'a TagGroup>,
    local_tags: TagGroup,

    has_tags: bool,
}

impl<'a> EventFormatter<'a> {
    pub fn with_tag_group(mut self, tags: &'a TagGroup) -> Self {
        if tags.len() > 0 {
            self.has_tags = true;
            self.common_tags = Some(tags);
        }
        self
    }

    pub fn with_tag<T: AsRef<str>>(mut self, key: &str, value: T) -> Self {
        // set has_tags later when send
        self.local_tags.add_tag(key, value);
        self
    }

    pub fn send(mut self) {
        if self.local_tags.len() > 0 {
            self.has_tags = true;
        }

        // Lengths go on the wire in bytes, measured after escaping
        let title = escape_newlines(self.title);
        let text = escape_newlines(self.text);

        let mut msg: Vec<u8> = Vec::with_capacity(32 + title.len() + text.len());
        let mut len_buf = itoa::Buffer::new();
        msg.extend_from_slice(b"_e{");
        msg.extend_from_slice(len_buf.format(title.len()).as_bytes());
        msg.push(b',');
        msg.extend_from_slice(len_buf.format(text.len()).as_bytes());
        msg.extend_from_slice(b"}:");
        msg.extend_from_slice(title.as_bytes());
        msg.push(b'|');
        msg.extend_from_slice(text.as_bytes());

        if self.has_tags {
            append_tag_section(
                &mut msg,
                &self.client.tags,
                self.common_tags,
                &self.local_tags,
            );
        }

        self.client.emit(&msg);
    }
}

fn escape_newlines(s: &str) -> Cow<'_, str> {
    if s.contains('\n') {
        Cow::Owned(s.replace('\n', "\\n"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Append `|#` and the client, common and local tags, comma separated
fn append_tag_section(
    msg: &mut Vec<u8>,
    client_tags: &TagGroup,
    common_tags: Option<&TagGroup>,
    local_tags: &TagGroup,
) {
    msg.extend_from_slice(b"|#");

    let mut append_comma = false;
    if client_tags.len() > 0 {
        msg.extend_from_slice(client_tags.as_bytes());
        append_comma = true;
    }

    if let Some(common_tags) = common_tags {
        if append_comma {
            msg.push(b',');
        }
        msg.extend_from_slice(common_tags.as_bytes());
        append_comma = true;
    }

    if local_tags.len() > 0 {
        if append_comma {
            msg.push(b',');
        }
        msg.extend_from_slice(local_tags.as_bytes());
    }
}

//! Sitemap, robots.txt and city landing data.

use chrono::NaiveDateTime;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::utils::text::capitalize;

const CITY_NAMES: &[(&str, &str)] = &[
    ("istanbul", "İstanbul"),
    ("ankara", "Ankara"),
    ("izmir", "İzmir"),
    ("gebze", "Gebze"),
    ("kocaeli", "Kocaeli"),
    ("darica", "Darıca"),
    ("bursa", "Bursa"),
    ("antalya", "Antalya"),
    ("adana", "Adana"),
    ("gaziantep", "Gaziantep"),
    ("konya", "Konya"),
    ("mersin", "Mersin"),
    ("kayseri", "Kayseri"),
    ("eskisehir", "Eskişehir"),
    ("diyarbakir", "Diyarbakır"),
    ("samsun", "Samsun"),
    ("denizli", "Denizli"),
    ("sanliurfa", "Şanlıurfa"),
    ("adapazari", "Adapazarı"),
    ("malatya", "Malatya"),
    ("kahramanmaras", "Kahramanmaraş"),
    ("erzurum", "Erzurum"),
    ("van", "Van"),
    ("batman", "Batman"),
    ("elazig", "Elazığ"),
    ("erzincan", "Erzincan"),
    ("tekirdag", "Tekirdağ"),
    ("balikesir", "Balıkesir"),
    ("aydin", "Aydın"),
    ("manisa", "Manisa"),
    ("mugla", "Muğla"),
    ("trabzon", "Trabzon"),
    ("ordu", "Ordu"),
    ("rize", "Rize"),
    ("sakarya", "Sakarya"),
    ("edirne", "Edirne"),
];

/// Cities with a landing page listed in the sitemap.
pub const SITEMAP_CITIES: &[&str] = &[
    "istanbul",
    "ankara",
    "izmir",
    "bursa",
    "antalya",
    "adana",
    "gaziantep",
    "konya",
    "mersin",
    "kayseri",
    "eskisehir",
    "diyarbakir",
    "samsun",
    "denizli",
    "sanliurfa",
    "gebze",
    "kocaeli",
    "darica",
    "adapazari",
    "tekirdag",
    "balikesir",
    "aydin",
    "manisa",
    "trabzon",
    "sakarya",
];

pub const STATIC_PAGES: &[&str] = &[
    "/",
    "/ilanlar/",
    "/hakkimizda/",
    "/iletisim/",
    "/nasil-calisir/",
    "/sss/",
    "/gizlilik-politikasi/",
    "/kullanim-kosullari/",
];

pub fn city_display_name(slug: &str) -> String {
    let slug = slug.to_lowercase();
    CITY_NAMES
        .iter()
        .find(|(key, _)| *key == slug)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| capitalize(&slug))
}

#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub path: String,
    pub last_modified: Option<NaiveDateTime>,
    pub change_frequency: &'static str,
    pub priority: &'static str,
}

impl SitemapEntry {
    pub fn new(path: impl Into<String>, change_frequency: &'static str, priority: &'static str) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            change_frequency,
            priority,
        }
    }

    pub fn modified_at(mut self, at: NaiveDateTime) -> Self {
        self.last_modified = Some(at);
        self
    }
}

pub fn render_sitemap(base_url: &str, entries: &[SitemapEntry]) -> Result<Vec<u8>, quick_xml::Error> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", "http://www.sitemaps.org/schemas/sitemap/0.9"));
    writer.write_event(Event::Start(urlset))?;

    for entry in entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;

        let location = format!("{base_url}{}", entry.path);
        writer.write_event(Event::Start(BytesStart::new("loc")))?;
        writer.write_event(Event::Text(BytesText::new(&location)))?;
        writer.write_event(Event::End(BytesEnd::new("loc")))?;

        if let Some(modified) = entry.last_modified {
            let lastmod = modified.format("%Y-%m-%d").to_string();
            writer.write_event(Event::Start(BytesStart::new("lastmod")))?;
            writer.write_event(Event::Text(BytesText::new(&lastmod)))?;
            writer.write_event(Event::End(BytesEnd::new("lastmod")))?;
        }

        writer.write_event(Event::Start(BytesStart::new("changefreq")))?;
        writer.write_event(Event::Text(BytesText::new(entry.change_frequency)))?;
        writer.write_event(Event::End(BytesEnd::new("changefreq")))?;

        writer.write_event(Event::Start(BytesStart::new("priority")))?;
        writer.write_event(Event::Text(BytesText::new(entry.priority)))?;
        writer.write_event(Event::End(BytesEnd::new("priority")))?;

        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;
    Ok(writer.into_inner())
}

pub fn render_robots(base_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /api/\nDisallow: /admin/\n\nSitemap: {base_url}/sitemap.xml\n"
    )
}

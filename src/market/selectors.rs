//! Every selector and anchor phrase the storefront is read through.
//!
//! The class names are generated by the storefront build and rotate; when a
//! stage starts coming back empty, this is the file to update.

use std::time::Duration;

use crate::driver::Locator;

/// Marker that separates product pages from the rest of the site.
pub const PRODUCT_PATH_MARKER: &str = "/product/";

/// Consent and dismiss buttons, cleared on the pickup and search pages.
/// Their cookies carry over to product pages.
pub const DISMISS_BUTTONS: &[Locator] = &[
    Locator::Text("Принять"),
    Locator::Text("Понятно"),
    Locator::Text("Закрыть"),
    Locator::Css("[aria-label='Закрыть']"),
];

pub const DISMISS_TIMEOUT: Duration = Duration::from_secs(1);

/// Pickup-point page confirm controls; the first one present is clicked.
pub const PICKUP_CONFIRM_BUTTONS: &[Locator] = &[
    Locator::Text("Сохранить адрес"),
    Locator::Text("Заберу отсюда"),
    Locator::Text("Подтвердить"),
];

pub const PICKUP_CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

pub mod search {
    use super::*;

    pub const PRODUCT_LINK: Locator = Locator::Css("a[href*='/product/']");
}

pub mod card {
    use std::ops::RangeInclusive;

    use super::*;

    /// Section heading of the shop block on new card layouts.
    pub const SHOP_ANCHOR: Locator = Locator::Text("Магазин");
    /// Levels from the heading up to the shop section.
    pub const SHOP_SECTION_DEPTH: usize = 6;
    pub const SHOP_NAME: Locator = Locator::Css("span.b35_3_18-b6");
    pub const SECTION_LINK: Locator = Locator::Css("a");
    pub const SELLER_LINK: Locator = Locator::Css("a[href*='/seller/']");
    pub const SHOP_LINK: Locator = Locator::Css("a[href*='/shop/']");
    pub const SELLER_HREF_MARKER: &str = "/seller/";
    /// Character count a seller name must fall in; longer text is a whole block.
    pub const SHOP_NAME_CHARS: RangeInclusive<usize> = 2..=120;

    /// Old card layouts label the seller block "Продавец".
    pub const LEGACY_SELLER_ANCHOR: Locator = Locator::Text("Продавец");
    pub const LEGACY_SELLER_PHRASE: &str = "Продавец";
    pub const LEGACY_SELLER_DEPTH: usize = 2;

    /// Payment-method price call-outs, most specific first. Text matching is
    /// case-sensitive, so capitalized forms are listed separately.
    pub const REFERENCE_PRICE_ANCHORS: &[Locator] = &[
        Locator::Text("по Ozon карте"),
        Locator::Text("Ozon карт"),
        Locator::Text("Ozon Карт"),
        Locator::Text("Ozon Банк"),
        Locator::Text("по карте"),
    ];
    /// Levels above a call-out searched for its price, nearest first.
    pub const REFERENCE_PRICE_DEPTHS: &[usize] = &[1, 2, 3, 4];
    pub const PAGE_BODY: Locator = Locator::Css("body");
    /// Page text marker the last-resort price window is centred on.
    pub const REFERENCE_PRICE_MARKER: &str = "ozon";
    /// Characters kept before and after the marker.
    pub const REFERENCE_WINDOW_BEFORE: usize = 200;
    pub const REFERENCE_WINDOW_AFTER: usize = 400;

    pub const ANCHOR_TIMEOUT: Duration = Duration::from_secs(2);
    pub const FALLBACK_TIMEOUT: Duration = Duration::from_secs(1);
    /// Wait for call-outs after the first; the page is settled by then.
    pub const EXTRA_ANCHOR_TIMEOUT: Duration = Duration::from_millis(300);
}

pub mod offers {
    use super::*;

    pub const OPEN_PANEL: Locator = Locator::Text("Есть дешевле");
    pub const PANEL: Locator = Locator::Css("div[data-widget='webSellerList']");
    pub const CARD: Locator = Locator::Css("div.pdp_mb0");
    pub const SHOP_LINK: Locator = Locator::Css("a.pdp_ea6");
    pub const PRICE: Locator = Locator::Css("div.pdp_l9b");
    pub const DELIVERY: Locator = Locator::Text("Доставим");
    pub const LOAD_MORE: Locator = Locator::Css("button.b25_5_2-b7");
    pub const CLOSE: Locator = Locator::Css("div.b65_4_14-a5 button");

    pub const OPEN_TIMEOUT: Duration = Duration::from_secs(2);
    pub const PANEL_TIMEOUT: Duration = Duration::from_secs(4);
    pub const FIELD_TIMEOUT: Duration = Duration::from_millis(100);
    pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);
}

pub mod interstitial {
    pub const TITLE_MARKER: &str = "captcha";
    pub const HTML_MARKER: &str = "доступ ограничен";
}

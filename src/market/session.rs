use std::time::Duration;

use tracing::{debug, info, warn};

use super::selectors::{
    interstitial, DISMISS_BUTTONS, DISMISS_TIMEOUT, PICKUP_CONFIRM_BUTTONS, PICKUP_CONFIRM_TIMEOUT,
};
use crate::config::ScrapeSettings;
use crate::driver::{click_if_present, PageDriver};
use crate::error::{ScrapeError, ScrapeResult};

/// Give the page time to render after a navigation or a UI-triggered load.
pub async fn settle(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}

/// Click away consent and notification banners that cover the page.
pub async fn dismiss_banners<D: PageDriver>(driver: &D) {
    for locator in DISMISS_BUTTONS {
        match click_if_present(driver, *locator, DISMISS_TIMEOUT).await {
            Ok(true) => debug!("Dismissed banner {:?}", locator),
            Ok(false) => {}
            Err(e) => debug!("Banner lookup {:?} failed: {}", locator, e),
        }
    }
}

/// Pin the session to the configured pickup point so every price and
/// delivery estimate in the run refers to the same location.
///
/// Returns whether a confirm control was clicked.
pub async fn select_pickup_point<D: PageDriver>(
    driver: &D,
    settings: &ScrapeSettings,
) -> ScrapeResult<bool> {
    let Some(pickup_url) = settings.pickup_url.as_deref() else {
        return Ok(false);
    };

    info!("Selecting pickup point: {}", pickup_url);
    driver.navigate(pickup_url).await?;
    settle(settings.settle_pause).await;
    dismiss_banners(driver).await;

    let mut confirmed = false;
    for locator in PICKUP_CONFIRM_BUTTONS {
        if click_if_present(driver, *locator, PICKUP_CONFIRM_TIMEOUT).await? {
            debug!("Pickup point confirmed via {:?}", locator);
            confirmed = true;
            settle(settings.settle_pause).await;
            break;
        }
    }
    if !confirmed {
        warn!("No pickup confirm control found on {}", pickup_url);
    }

    driver.navigate(&settings.base_url).await?;
    settle(settings.settle_pause).await;
    Ok(confirmed)
}

async fn is_interstitial<D: PageDriver>(driver: &D) -> ScrapeResult<bool> {
    let title = driver.current_title().await?.to_lowercase();
    if title.contains(interstitial::TITLE_MARKER) {
        return Ok(true);
    }
    let html = driver.current_html().await?.to_lowercase();
    Ok(html.contains(interstitial::HTML_MARKER))
}

/// Detect a bot interstitial on the current page, wait once for it to be
/// solved by hand, and re-check. Still blocked afterwards is an error for
/// the current item only.
pub async fn guard_interstitial<D: PageDriver>(
    driver: &D,
    settings: &ScrapeSettings,
    url: &str,
) -> ScrapeResult<()> {
    if !is_interstitial(driver).await? {
        return Ok(());
    }

    warn!(
        "Bot interstitial on {}; solve it in the browser within {:.0}s",
        url,
        settings.interstitial_wait.as_secs_f64()
    );
    settle(settings.interstitial_wait).await;

    if is_interstitial(driver).await? {
        return Err(ScrapeError::Interstitial(url.to_string()));
    }
    info!("Interstitial cleared on {}", url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::scripted::{El, ScriptedDriver, ScriptedPage, ROOT};

    #[tokio::test]
    async fn pickup_point_confirmed_then_back_to_root() {
        let settings = ScrapeSettings {
            pickup_url: Some("https://market.test/geo/point/1/".into()),
            ..ScrapeSettings::instant()
        };
        let mut page = ScriptedPage::new();
        page.add(ROOT, El::new().named("accept").text("Принять"));
        page.add(ROOT, El::new().named("pick").text("Заберу отсюда"));
        let driver = ScriptedDriver::new().page("https://market.test/geo/point/1/", page);

        assert!(select_pickup_point(&driver, &settings).await.unwrap());
        assert_eq!(driver.clicked(), vec!["accept", "pick"]);
        assert_eq!(
            driver.visits(),
            vec!["https://market.test/geo/point/1/", "https://market.test/"]
        );
    }

    #[tokio::test]
    async fn pickup_point_disabled() {
        let driver = ScriptedDriver::new();
        assert!(!select_pickup_point(&driver, &ScrapeSettings::instant()).await.unwrap());
        assert!(driver.visits().is_empty());
    }

    #[tokio::test]
    async fn clean_page_passes_guard() {
        let driver = ScriptedDriver::new().page("https://market.test/product/a/", ScriptedPage::new());
        driver.navigate("https://market.test/product/a/").await.unwrap();
        let settings = ScrapeSettings::instant();
        assert!(guard_interstitial(&driver, &settings, "https://market.test/product/a/")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn persistent_interstitial_fails_the_item() {
        let page = ScriptedPage::new().with_html("<h1>Доступ ограничен</h1>");
        let driver = ScriptedDriver::new().page("https://market.test/product/a/", page);
        driver.navigate("https://market.test/product/a/").await.unwrap();
        let err = guard_interstitial(&driver, &ScrapeSettings::instant(), "https://market.test/product/a/")
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Interstitial(_)));
    }

    #[tokio::test]
    async fn captcha_title_is_detected() {
        let page = ScriptedPage::new().titled("Captcha check");
        let driver = ScriptedDriver::new().page("https://market.test/product/b/", page);
        driver.navigate("https://market.test/product/b/").await.unwrap();
        assert!(is_interstitial(&driver).await.unwrap());
    }
}

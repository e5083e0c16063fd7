use std::sync::Arc;

use tokio::sync::Mutex;
use waitgroup::WaitGroup;

use super::*;
use crate::api::setting_engine::SettingEngine;
use crate::api::APIBuilder;
use util::vnet::net::{Net, NetConfig};
use util::vnet::router::{Router, RouterConfig};

/// new_pair creates two new peer connections (an offerer and an answerer)
/// using the provided API.
pub(crate) async fn new_pair(
    api: &API,
) -> Result<(RTCPeerConnection, RTCPeerConnection)> {
    let pca = api.new_peer_connection(RTCConfiguration::default()).await?;
    let pcb = api.new_peer_connection(RTCConfiguration::default()).await?;

    Ok((pca, pcb))
}

/// signal_pair exchanges an offer/answer between the two peer connections,
/// waiting for ICE gathering to complete on both sides before applying each
/// description.
pub(crate) async fn signal_pair(
    pc_offer: &mut RTCPeerConnection,
    pc_answer: &mut RTCPeerConnection,
) -> Result<()> {
    // Creating a data channel ensures ICE candidate gathering starts even when
    // no media has been added yet.
    pc_offer
        .create_data_channel("initial_data_channel", None)
        .await?;

    let offer = pc_offer.create_offer(None).await?;

    let mut offer_gathering_complete = pc_offer.gathering_complete_promise().await;
    pc_offer.set_local_description(offer).await?;
    let _ = offer_gathering_complete.recv().await;

    pc_answer
        .set_remote_description(
            pc_offer
                .local_description()
                .await
                .ok_or_else(|| Error::ErrOthers("offer has no local description".to_owned()))?,
        )
        .await?;

    let answer = pc_answer.create_answer(None).await?;

    let mut answer_gathering_complete = pc_answer.gathering_complete_promise().await;
    pc_answer.set_local_description(answer).await?;
    let _ = answer_gathering_complete.recv().await;

    pc_offer
        .set_remote_description(
            pc_answer
                .local_description()
                .await
                .ok_or_else(|| Error::ErrOthers("answer has no local description".to_owned()))?,
        )
        .await
}

/// close_pair_now closes both peer connections, ignoring any errors. Used by
/// tests that don't care about a clean shutdown.
pub(crate) async fn close_pair_now(pc1: &RTCPeerConnection, pc2: &RTCPeerConnection) {
    let _ = pc1.close().await;
    let _ = pc2.close().await;
}

/// until_connection_state registers a handler on pc that completes a worker
/// from wg once the peer connection reaches the target state.
pub(crate) async fn until_connection_state(
    pc: &mut RTCPeerConnection,
    wg: &WaitGroup,
    state: RTCPeerConnectionState,
) {
    let worker = Arc::new(Mutex::new(Some(wg.worker())));
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        let worker = Arc::clone(&worker);
        Box::pin(async move {
            if s == state {
                let mut w = worker.lock().await;
                w.take();
            }
        })
    }))
    .await;
}

/// create_vnet_pair builds two peer connections whose ICE transports are
/// bridged through a virtual network router instead of the host network,
/// so that tests don't depend on real sockets.
pub(crate) async fn create_vnet_pair(
) -> Result<(RTCPeerConnection, RTCPeerConnection, Arc<Mutex<Router>>)> {
    let wan = Arc::new(Mutex::new(Router::new(RouterConfig {
        cidr: "1.2.3.0/24".to_owned(),
        ..Default::default()
    })?));

    let net1 = Arc::new(Net::new(Some(NetConfig {
        static_ips: vec!["1.2.3.4".to_owned()],
        ..Default::default()
    })));
    let net2 = Arc::new(Net::new(Some(NetConfig {
        static_ips: vec!["1.2.3.5".to_owned()],
        ..Default::default()
    })));

    for net in [&net1, &net2] {
        let nic = net.get_nic()?;
        {
            let mut w = wan.lock().await;
            w.add_net(Arc::clone(&nic)).await?;
        }
        {
            let n = nic.lock().await;
            n.set_router(Arc::clone(&wan)).await?;
        }
    }
    {
        let mut w = wan.lock().await;
        w.start().await?;
    }

    let mut m1 = MediaEngine::default();
    m1.register_default_codecs()?;
    let mut s1 = SettingEngine::default();
    s1.set_vnet(Some(net1));
    let api1 = APIBuilder::new()
        .with_media_engine(m1)
        .with_setting_engine(s1)
        .build();

    let mut m2 = MediaEngine::default();
    m2.register_default_codecs()?;
    let mut s2 = SettingEngine::default();
    s2.set_vnet(Some(net2));
    let api2 = APIBuilder::new()
        .with_media_engine(m2)
        .with_setting_engine(s2)
        .build();

    let offer_pc = api1.new_peer_connection(RTCConfiguration::default()).await?;
    let answer_pc = api2.new_peer_connection(RTCConfiguration::default()).await?;

    Ok((offer_pc, answer_pc, wan))
}

use ethers::prelude::abigen;

// Generates the bindings for the `DisputeGameFactory` contract.
abigen!(
    DisputeGameFactory,
    r"[
        event DisputeGameCreated(address indexed disputeProxy, uint8 indexed gameType, bytes32 indexed rootClaim)
        function gameCount() external view returns (uint256 gameCount_)
        function gameAtIndex(uint256 _index) external view returns (uint8 gameType_, uint64 timestamp_, address proxy_)
    ]"
);

use alloy::sol;

sol! {
    #[sol(rpc)]
    contract ERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
    }

    #[sol(rpc)]
    contract PositionToken {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Paused(address account);
        event Unpaused(address account);
        event RoleGranted(bytes32 indexed role, address indexed account, address indexed sender);
        event RoleRevoked(bytes32 indexed role, address indexed account, address indexed sender);

        function initialize(string memory name, string memory symbol) external;
        function mint(address to, uint256 amount) external;
        function burn(address from, uint256 amount) external;
        function pause() external;
        function unpause() external;
        function paused() external view returns (bool);
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function hasRole(bytes32 role, address account) external view returns (bool);
        function grantRole(bytes32 role, address account) external;
        function renounceRole(bytes32 role, address account) external;
    }

    /// Bridged token deployed directly on Polygon, outside of the factory.
    #[sol(rpc)]
    contract MaticVolatilityToken {
        constructor(string memory name, string memory symbol, address childChainManager);
    }

    #[sol(rpc)]
    contract VolmexProtocol {
        event ToggleActivated(bool isActive);
        event UpdatedFees(uint256 issuanceFees, uint256 redeemFees);
        event UpdatedMinimumCollateral(uint256 newMinimumCollateralQty);
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);

        function initialize(
            address _collateralTokenAddress,
            address _volatilityToken,
            address _inverseVolatilityToken,
            uint256 _minimumCollateralQty,
            uint256 _volatilityCapRatio
        ) external;

        function active() external view returns (bool);
        function collateral() external view returns (address);
        function volatilityToken() external view returns (address);
        function inverseVolatilityToken() external view returns (address);
        function minimumCollateralQty() external view returns (uint256);
        function volatilityCapRatio() external view returns (uint256);
        function issuanceFees() external view returns (uint256);
        function redeemFees() external view returns (uint256);
        function accumulatedFees() external view returns (uint256);
        function owner() external view returns (address);

        function updateFees(uint256 _issuanceFees, uint256 _redeemFees) external;
        function toggleActive() external;
        function updateMinimumCollQty(uint256 _newMinimumCollQty) external;
        function transferOwnership(address newOwner) external;
    }

    /// Factory that deploys the protocol itself together with the token pair.
    #[sol(rpc)]
    contract IndexFactoryV1 {
        event IndexCreated(uint256 indexed indexCount, address indexed index);
        event PositionTokenCreated(
            address volatilityToken,
            address inverseVolatilityToken,
            string name,
            string symbol
        );

        function initialize(address _implementation) external;
        function createIndex(
            address _collateralTokenAddress,
            uint256 _minimumCollateralQty,
            uint256 _volatilityCapRatio,
            string memory _tokenName,
            string memory _tokenSymbol
        ) external returns (address);
        function indexCount() external view returns (uint256);
        function getIndex(uint256 _indexCount) external view returns (address);
    }

    /// Factory registering protocols by the index count of their token pair.
    #[sol(rpc)]
    contract IndexFactoryV2 {
        event PositionTokenCreated(
            uint256 indexed indexCount,
            address volatilityToken,
            address inverseVolatilityToken,
            string name,
            string symbol
        );
        event IndexRegistered(uint256 indexed indexCount, address indexed index);

        function initialize(address _implementation) external;
        function createVolatilityTokens(string memory _tokenName, string memory _tokenSymbol)
            external
            returns (address volatilityToken, address inverseVolatilityToken);
        function registerIndex(uint256 _indexCount, address _volmexProtocolContract) external;
        function indexCount() external view returns (uint256);
        function getIndex(uint256 _indexCount) external view returns (address);
    }

    /// Factory registering protocols by collateral symbol.
    #[sol(rpc)]
    contract IndexFactoryV3 {
        event VolatilityTokenCreated(
            address indexed volatilityToken,
            address indexed inverseVolatilityToken,
            string tokenName,
            string tokenSymbol
        );
        event IndexRegistered(uint256 indexed indexCount, address indexed index);

        function initialize(address _implementation) external;
        function createVolatilityTokens(string memory _tokenName, string memory _tokenSymbol)
            external
            returns (address volatilityToken, address inverseVolatilityToken);
        function registerIndex(address _volmexProtocolContract, string memory _collateralSymbol) external;
        function indexCount() external view returns (uint256);
        function getIndex(uint256 _indexCount) external view returns (address);
    }

    /// Polygon factory flavour: no clone implementation, tokens are deployed up front.
    #[sol(rpc)]
    interface IStandaloneIndexFactory {
        function initialize() external;
    }

    #[sol(rpc)]
    contract ProxyAdmin {
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);

        function owner() external view returns (address);
        function getProxyAdmin(address proxy) external view returns (address);
        function upgrade(address proxy, address implementation) external;
        function upgradeAndCall(address proxy, address implementation, bytes memory data) external payable;
        function transferOwnership(address newOwner) external;
    }

    #[sol(rpc)]
    contract TransparentUpgradeableProxy {
        event Upgraded(address indexed implementation);
        event AdminChanged(address previousAdmin, address newAdmin);

        constructor(address _logic, address admin_, bytes memory _data) payable;
    }
}
